use super::*;
use crate::foundation::core::Fps;
use image::AnimationDecoder;

fn cfg(w: u32, h: u32) -> SinkConfig {
    SinkConfig {
        width: w,
        height: h,
        fps: Fps::new(10, 1).unwrap(),
    }
}

fn frame(w: u32, h: u32, px: [u8; 4]) -> FrameRGBA {
    FrameRGBA {
        width: w,
        height: h,
        data: px.repeat((w * h) as usize),
        premultiplied: true,
    }
}

#[test]
fn writes_a_looping_animation_with_every_frame() {
    let mut out = Vec::new();
    {
        let mut sink = GifSink::new(&mut out);
        sink.begin(cfg(4, 4)).unwrap();
        sink.push_frame(FrameIndex(0), 0.0, &frame(4, 4, [255, 0, 0, 255]))
            .unwrap();
        sink.push_frame(FrameIndex(1), 0.1, &frame(4, 4, [0, 0, 255, 255]))
            .unwrap();
        sink.end().unwrap();
    }
    assert!(out.starts_with(b"GIF89a"));

    let decoder = image::codecs::gif::GifDecoder::new(std::io::Cursor::new(out)).unwrap();
    let frames = decoder.into_frames().collect_frames().unwrap();
    assert_eq!(frames.len(), 2);
    let (num, den) = frames[0].delay().numer_denom_ms();
    assert_eq!(num / den, 100);
    let first = frames[0].buffer().get_pixel(1, 1).0;
    assert!(first[0] > 200 && first[2] < 50, "{first:?}");
}

#[test]
fn rejects_out_of_order_and_mismatched_frames() {
    let mut out = Vec::new();
    let mut sink = GifSink::new(&mut out);
    sink.begin(cfg(2, 2)).unwrap();
    sink.push_frame(FrameIndex(1), 0.0, &frame(2, 2, [0, 0, 0, 255]))
        .unwrap();
    let err = sink
        .push_frame(FrameIndex(1), 0.0, &frame(2, 2, [0, 0, 0, 255]))
        .unwrap_err();
    assert!(matches!(err, LayerstackError::EncodeFailure(_)));
    let err = sink
        .push_frame(FrameIndex(2), 0.0, &frame(4, 2, [0, 0, 0, 255]))
        .unwrap_err();
    assert!(matches!(err, LayerstackError::EncodeFailure(_)));
}

#[test]
fn push_before_begin_is_an_encode_failure() {
    let mut out = Vec::new();
    let mut sink = GifSink::new(&mut out);
    assert!(sink
        .push_frame(FrameIndex(0), 0.0, &frame(2, 2, [0, 0, 0, 255]))
        .is_err());
}

#[test]
fn abort_removes_the_partial_file() {
    let path = std::env::temp_dir().join(format!("layerstack_abort_{}.gif", std::process::id()));
    let mut sink = GifSink::create(&path).unwrap();
    sink.begin(cfg(2, 2)).unwrap();
    sink.push_frame(FrameIndex(0), 0.0, &frame(2, 2, [0, 0, 0, 255]))
        .unwrap();
    sink.abort();
    assert!(!path.exists());
}

/// Accepts bytes until armed, then fails every write or flush.
struct BreaksWhenArmed {
    bytes: Vec<u8>,
    armed: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

impl BreaksWhenArmed {
    fn check(&self) -> std::io::Result<()> {
        if self.armed.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(std::io::Error::other("disk full"));
        }
        Ok(())
    }
}

impl Write for BreaksWhenArmed {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.check()?;
        self.bytes.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.check()
    }
}

#[test]
fn failed_trailer_write_fails_end() {
    let armed = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let mut sink = GifSink::new(BreaksWhenArmed {
        bytes: Vec::new(),
        armed: armed.clone(),
    });
    sink.begin(cfg(2, 2)).unwrap();
    sink.push_frame(FrameIndex(0), 0.0, &frame(2, 2, [0, 255, 0, 255]))
        .unwrap();
    armed.store(true, std::sync::atomic::Ordering::SeqCst);
    let err = sink.end().unwrap_err();
    assert!(matches!(err, LayerstackError::EncodeFailure(_)));
}

#[test]
fn frame_delay_rounds_to_centiseconds() {
    assert_eq!(frame_delay_cs(10, 1), 10);
    assert_eq!(frame_delay_cs(30, 1), 3);
    assert_eq!(frame_delay_cs(30000, 1001), 3);
    assert_eq!(frame_delay_cs(1000, 1), 1);
}
