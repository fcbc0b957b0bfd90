//! ffprobe/ffmpeg helpers: probing assets and encoding trimmed ranges.

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Deserialize;

use reelkit_common::clock::EmitThrottle;
use reelkit_common::error::{ReelkitError, ReelkitResult};
use reelkit_media::{AssetInfo, EncodeRequest, NaturalSize, ProgressFn};

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Probe duration, first-video-track size, and audio presence.
pub fn probe_asset(path: &Path) -> ReelkitResult<AssetInfo> {
    if !path.exists() {
        return Err(ReelkitError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "stream=codec_type,width,height:format=duration",
            "-of",
            "json",
        ])
        .arg(path)
        .output()
        .map_err(|e| ReelkitError::asset_open(path.display(), format!("failed to run ffprobe: {e}")))?;

    if !output.status.success() {
        return Err(ReelkitError::asset_open(
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    let raw = String::from_utf8_lossy(&output.stdout);
    parse_probe_output(&raw)
        .map_err(|e| ReelkitError::asset_open(path.display(), e.to_string()))
}

fn parse_probe_output(raw: &str) -> ReelkitResult<AssetInfo> {
    let probe: ProbeOutput = serde_json::from_str(raw)?;

    let duration_secs = probe
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .unwrap_or(0.0);

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));
    let natural_size = video
        .and_then(|s| Some(NaturalSize::new(s.width?, s.height?)))
        .unwrap_or(NaturalSize::new(0, 0));
    let has_audio = probe
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    Ok(AssetInfo {
        duration_secs,
        natural_size,
        playable: video.is_some() && duration_secs > 0.0,
        has_audio,
    })
}

/// Build the ffmpeg argument list for one encode request.
///
/// The source frame geometry is kept; only the time range is trimmed and
/// the optional overlay is composited on top.
pub fn build_encode_args(request: &EncodeRequest, source: &Path) -> Vec<String> {
    let range = request.input.range();
    let mut args = vec![
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-nostats".to_string(),
        "-progress".to_string(),
        "pipe:1".to_string(),
        "-ss".to_string(),
        format!("{:.6}", range.start()),
        "-i".to_string(),
        source.display().to_string(),
    ];

    if let Some(overlay) = &request.overlay {
        let (w, h) = overlay.scaled_size();
        args.push("-loop".to_string());
        args.push("1".to_string());
        args.push("-i".to_string());
        args.push(overlay.image.display().to_string());
        args.push("-filter_complex".to_string());
        args.push(format!(
            "[1:v]scale={w}:{h}[ov];[0:v][ov]overlay={x}:{y}:eof_action=repeat[vout]",
            x = overlay.rect.x.round() as i64,
            y = overlay.rect.y.round() as i64,
        ));
        args.push("-map".to_string());
        args.push("[vout]".to_string());
    } else {
        args.push("-map".to_string());
        args.push("0:v:0".to_string());
    }
    args.push("-map".to_string());
    args.push("0:a?".to_string());

    args.push("-t".to_string());
    args.push(format!("{:.6}", range.duration()));

    let encoder = &request.encoder;
    args.extend([
        "-c:v".to_string(),
        encoder.video_codec.clone(),
        "-preset".to_string(),
        encoder.preset.clone(),
        "-crf".to_string(),
        encoder.crf.to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        format!("{}k", encoder.audio_bitrate_kbps.max(64)),
        "-movflags".to_string(),
        "+faststart".to_string(),
    ]);

    args.push(request.output.display().to_string());
    args
}

/// Run ffmpeg to completion, reporting progress and honouring `cancel`.
pub fn run_ffmpeg(
    args: &[String],
    expected_duration_secs: f64,
    progress_hz: u32,
    progress: ProgressFn<'_>,
    cancel: &AtomicBool,
) -> ReelkitResult<()> {
    tracing::debug!(?args, "Running ffmpeg");
    let mut child = Command::new("ffmpeg")
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ReelkitError::encode(format!("Failed to start ffmpeg: {e}")))?;

    tracing::info!(pid = child.id(), expected_duration_secs, "ffmpeg process started");

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ReelkitError::encode("Failed to capture ffmpeg stdout"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| ReelkitError::encode("Failed to capture ffmpeg stderr"))?;

    // ffmpeg blocks once the stderr pipe fills, so drain it on its own thread.
    let stderr_task = std::thread::spawn(move || -> String {
        let mut reader = BufReader::new(stderr);
        let mut output = String::new();
        match reader.read_to_string(&mut output) {
            Ok(_) => output,
            Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
        }
    });

    let started = std::time::Instant::now();
    let pumped = pump_progress(
        BufReader::new(stdout),
        expected_duration_secs,
        progress_hz,
        progress,
        cancel,
    );
    if !matches!(pumped, Pumped::Eof) {
        tracing::info!(pid = child.id(), "Stopping ffmpeg");
        child.kill().ok();
    }

    let status = child.wait();
    let stderr_output = stderr_task
        .join()
        .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());
    let status =
        status.map_err(|e| ReelkitError::encode(format!("Failed to wait on ffmpeg: {e}")))?;

    match pumped {
        Pumped::Eof => {}
        Pumped::Cancelled => return Err(ReelkitError::Cancelled),
        Pumped::ReadFailed(e) => {
            return Err(ReelkitError::encode(format!(
                "Failed reading ffmpeg progress: {e}"
            )))
        }
    }
    if !status.success() {
        return Err(ReelkitError::encode(format!(
            "ffmpeg export failed (status {}): {}",
            status,
            stderr_output.trim()
        )));
    }

    progress(1.0);
    tracing::info!(elapsed_secs = started.elapsed().as_secs_f64(), "ffmpeg finished");
    Ok(())
}

/// How the progress stream ended.
#[derive(Debug)]
enum Pumped {
    Eof,
    Cancelled,
    ReadFailed(std::io::Error),
}

/// Read `-progress` key/value lines until EOF, cancellation or a read error.
fn pump_progress(
    mut reader: impl BufRead,
    expected_duration_secs: f64,
    progress_hz: u32,
    progress: ProgressFn<'_>,
    cancel: &AtomicBool,
) -> Pumped {
    let started = std::time::Instant::now();
    let mut throttle = EmitThrottle::new(progress_hz);
    let mut line = String::new();
    let mut state = ProgressState::default();

    loop {
        if cancel.load(Ordering::SeqCst) {
            return Pumped::Cancelled;
        }

        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => return Pumped::Eof,
            Ok(_) => {}
            Err(e) => return Pumped::ReadFailed(e),
        }

        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        state.update(key, value);
        if key == "progress" && !state.complete {
            let now_ns = started.elapsed().as_nanos() as u64;
            if throttle.should_emit(now_ns) {
                progress(state.fraction(expected_duration_secs));
            }
        }
    }
}

/// Encode a request whose source has already been resolved to `source`.
pub fn encode_with_ffmpeg(
    request: &EncodeRequest,
    source: &Path,
    progress: ProgressFn<'_>,
    cancel: &AtomicBool,
) -> ReelkitResult<PathBuf> {
    if let Some(parent) = request.output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if let Some(overlay) = &request.overlay {
        if !overlay.image.exists() {
            return Err(ReelkitError::FileNotFound {
                path: overlay.image.clone(),
            });
        }
    }

    let args = build_encode_args(request, source);
    run_ffmpeg(
        &args,
        request.input.duration(),
        request.encoder.progress_hz,
        progress,
        cancel,
    )?;
    Ok(request.output.clone())
}

pub fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[derive(Debug, Default)]
struct ProgressState {
    out_time_secs: f64,
    complete: bool,
}

impl ProgressState {
    fn update(&mut self, key: &str, value: &str) {
        match key {
            // ffmpeg reports `out_time_ms` in microseconds as well.
            "out_time_ms" | "out_time_us" => {
                if let Ok(us) = value.parse::<f64>() {
                    self.out_time_secs = us / 1_000_000.0;
                }
            }
            "progress" => {
                self.complete = value == "end";
            }
            _ => {}
        }
    }

    fn fraction(&self, expected_duration_secs: f64) -> f64 {
        if self.complete {
            return 1.0;
        }
        if expected_duration_secs <= 0.0 {
            return 0.0;
        }
        (self.out_time_secs / expected_duration_secs).clamp(0.0, 1.0)
    }
}
