//! Video decoding through the `ffprobe` and `ffmpeg` command line tools.
//!
//! `ffprobe` reports the frame size and count; `ffmpeg` then streams raw
//! 8-bit grayscale frames over a pipe.

use crate::error::SourceError;
use crate::source::FrameSource;
use fishtrack_events::Frame;
use image::GrayImage;
use serde::Deserialize;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    nb_frames: Option<String>,
    nb_read_packets: Option<String>,
}

/// Size and length of the first video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub frame_count: u64,
}

pub fn probe_video(path: &Path) -> Result<VideoInfo, SourceError> {
    let ffprobe = which::which("ffprobe").map_err(|_| SourceError::ToolMissing("ffprobe"))?;

    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-count_packets",
            "-show_entries",
            "stream=width,height,nb_frames,nb_read_packets",
            "-of",
            "json",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| SourceError::io(path, e))?;

    let probe_error = |message: String| SourceError::Probe {
        path: path.to_path_buf(),
        message,
    };
    if !output.status.success() {
        return Err(probe_error(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    parse_probe(&output.stdout).map_err(probe_error)
}

fn parse_probe(stdout: &[u8]) -> Result<VideoInfo, String> {
    let probe: ProbeOutput =
        serde_json::from_slice(stdout).map_err(|e| format!("unreadable ffprobe output: {e}"))?;
    let stream = probe
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| "no video stream".to_string())?;
    let (Some(width), Some(height)) = (stream.width, stream.height) else {
        return Err("video stream has no dimensions".to_string());
    };
    let frame_count = stream
        .nb_read_packets
        .as_deref()
        .or(stream.nb_frames.as_deref())
        .and_then(|n| n.parse::<u64>().ok())
        .ok_or_else(|| "frame count unavailable".to_string())?;
    Ok(VideoInfo {
        width,
        height,
        frame_count,
    })
}

/// Frames of a video file decoded by an `ffmpeg` child process.
#[derive(Debug)]
pub struct FfmpegSource {
    path: PathBuf,
    ffmpeg: PathBuf,
    info: VideoInfo,
    child: Option<(Child, ChildStdout)>,
    next_index: u64,
    /// Set once the decoder hits end of stream; cleared by `rewind`.
    exhausted: bool,
}

impl FfmpegSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let ffmpeg = which::which("ffmpeg").map_err(|_| SourceError::ToolMissing("ffmpeg"))?;
        let info = probe_video(path)?;
        if info.frame_count == 0 || info.width == 0 || info.height == 0 {
            return Err(SourceError::Empty {
                path: path.to_path_buf(),
            });
        }
        log::debug!(
            "{}: {}x{}, {} frames",
            path.display(),
            info.width,
            info.height,
            info.frame_count
        );
        Ok(Self {
            path: path.to_path_buf(),
            ffmpeg,
            info,
            child: None,
            next_index: 0,
            exhausted: false,
        })
    }

    pub fn info(&self) -> VideoInfo {
        self.info
    }

    fn spawn(&self) -> Result<(Child, ChildStdout), SourceError> {
        let mut child = Command::new(&self.ffmpeg)
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(&self.path)
            .args(["-f", "rawvideo", "-pix_fmt", "gray", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| SourceError::io(&self.path, e))?;
        let stdout = child.stdout.take().ok_or_else(|| {
            SourceError::io(&self.path, std::io::Error::other("ffmpeg stdout not captured"))
        })?;
        Ok((child, stdout))
    }

    fn stop(&mut self) {
        if let Some((mut child, _)) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl FrameSource for FfmpegSource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn frame_count(&self) -> u64 {
        self.info.frame_count
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        if self.exhausted {
            return Ok(None);
        }
        if self.child.is_none() {
            self.child = Some(self.spawn()?);
        }
        let Some((_, stdout)) = self.child.as_mut() else {
            return Ok(None);
        };

        let mut buf = vec![0u8; self.info.width as usize * self.info.height as usize];
        match stdout.read_exact(&mut buf) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                self.stop();
                self.exhausted = true;
                return Ok(None);
            }
            Err(e) => return Err(SourceError::io(&self.path, e)),
        }

        let image = GrayImage::from_raw(self.info.width, self.info.height, buf).ok_or_else(|| {
            SourceError::Probe {
                path: self.path.clone(),
                message: format!("short frame buffer at frame {}", self.next_index),
            }
        })?;
        let frame = Frame::new(self.next_index, image);
        self.next_index += 1;
        Ok(Some(frame))
    }

    fn rewind(&mut self) -> Result<(), SourceError> {
        self.stop();
        self.next_index = 0;
        self.exhausted = false;
        Ok(())
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_prefers_counted_packets() {
        let json = br#"{"streams":[{"width":640,"height":480,"nb_frames":"100","nb_read_packets":"98"}]}"#;
        assert_eq!(
            parse_probe(json).unwrap(),
            VideoInfo {
                width: 640,
                height: 480,
                frame_count: 98
            }
        );
        let json = br#"{"streams":[{"width":8,"height":4,"nb_frames":"12"}]}"#;
        assert_eq!(parse_probe(json).unwrap().frame_count, 12);
    }

    #[test]
    fn probe_rejects_streamless_output() {
        assert!(parse_probe(br#"{"streams":[]}"#).is_err());
        assert!(parse_probe(br#"{"streams":[{"nb_frames":"3"}]}"#).is_err());
        assert!(parse_probe(b"not json").is_err());
    }

    fn idle_source() -> FfmpegSource {
        FfmpegSource {
            path: PathBuf::from("clip.mp4"),
            ffmpeg: PathBuf::from("/nonexistent/ffmpeg"),
            info: VideoInfo {
                width: 8,
                height: 4,
                frame_count: 3,
            },
            child: None,
            next_index: 3,
            exhausted: true,
        }
    }

    #[test]
    fn exhausted_stream_stays_finished_until_rewind() {
        let mut source = idle_source();
        // no decoder is spawned once the stream has ended
        assert!(source.next_frame().unwrap().is_none());
        assert!(source.next_frame().unwrap().is_none());
        assert!(source.child.is_none());

        source.rewind().unwrap();
        assert_eq!(source.next_index, 0);
        // rewinding restarts decoding, which fails here on the missing binary
        assert!(matches!(source.next_frame(), Err(SourceError::Io { .. })));
    }
}
