// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

mod common;

use common::{
    depth_model_info, model_file, MockMemory, MockRuntime, ALLOC_ERROR, DEPTH_HEIGHT, DEPTH_WIDTH,
    RUN_ERROR,
};
use edgefirst_depth::{
    error::STATUS_FAILED, AlgoParams, BufferStrategy, ColorSpace, DepthPipeline, DepthRenderer,
    Direction, EngineSession, Error, IoInfo, OverlayConfig, PhysicalMemory, PixelFormat, Runtime,
    TensorMeta, VideoFrame, VideoFrameMut,
};
use std::{
    error::Error as StdError,
    io,
    path::Path,
    sync::{Arc, Mutex},
};
use tracing_subscriber::fmt::MakeWriter;

/// Collects formatted log lines for inspection.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn count(&self, needle: &str) -> usize {
        let buf = self.0.lock().unwrap();
        String::from_utf8_lossy(&buf).matches(needle).count()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn session(runtime: &Arc<MockRuntime>, memory: &Arc<MockMemory>) -> EngineSession {
    let rt: Arc<dyn Runtime> = runtime.clone();
    let mem: Arc<dyn PhysicalMemory> = memory.clone();
    EngineSession::new(rt, mem, DepthRenderer::default())
}

fn pipeline(runtime: &Arc<MockRuntime>, memory: &Arc<MockMemory>) -> DepthPipeline {
    let rt: Arc<dyn Runtime> = runtime.clone();
    let mem: Arc<dyn PhysicalMemory> = memory.clone();
    DepthPipeline::new(rt, mem, OverlayConfig::default())
}

/// Two inputs of 1 KiB and `outputs` outputs of 4 KiB.
fn multi_io_info(outputs: usize) -> IoInfo {
    IoInfo {
        inputs: (0..2)
            .map(|i| TensorMeta::new(&format!("in{i}"), &[1, 16, 64, 1], 1024, ColorSpace::Nv12))
            .collect(),
        outputs: (0..outputs)
            .map(|i| {
                TensorMeta::new(
                    &format!("out{i}"),
                    &[1, 1, 16, 64],
                    4096,
                    ColorSpace::Unspecified(0),
                )
            })
            .collect(),
    }
}

fn black_nv12(width: usize, height: usize) -> Vec<u8> {
    let mut buf = vec![128u8; width * height * 3 / 2];
    buf[..width * height].fill(16);
    buf
}

#[test]
fn test_load_allocates_every_tensor() -> Result<(), Box<dyn StdError>> {
    let runtime = Arc::new(MockRuntime::new(multi_io_info(3)));
    let memory = Arc::new(MockMemory::new());
    let mut sess = session(&runtime, &memory);
    let model = model_file("alloc-all");

    sess.load(&model)?;
    assert!(sess.is_loaded());
    assert_eq!(memory.live(), 5);
    assert_eq!(
        memory.strategies(),
        vec![
            BufferStrategy::Default,
            BufferStrategy::Default,
            BufferStrategy::Cached,
            BufferStrategy::Cached,
            BufferStrategy::Cached,
        ]
    );
    assert!(memory.requests.borrow().iter().all(|r| r.1 == 128));

    let buffers = sess.buffers().ok_or("no buffers")?;
    assert_eq!(buffers.inputs().len(), 2);
    assert_eq!(buffers.outputs().len(), 3);
    assert_eq!(buffers.inputs()[1].size(), 1024);
    assert_eq!(buffers.outputs()[2].size(), 4096);

    sess.release();
    assert!(!sess.is_loaded());
    assert_eq!(memory.live(), 0);
    assert_eq!(runtime.live_handles(), 0);
    Ok(())
}

#[test]
fn test_output_allocation_failure_releases_all() {
    let runtime = Arc::new(MockRuntime::new(multi_io_info(3)));
    // inputs 0 and 1, output 0, then output 1 fails
    let memory = Arc::new(MockMemory::failing_at(3));
    let mut sess = session(&runtime, &memory);

    let err = sess.load(model_file("output-fail")).unwrap_err();
    match &err {
        Error::Allocation {
            direction,
            index,
            code,
            size,
            ..
        } => {
            assert_eq!(*direction, Direction::Output);
            assert_eq!(*index, 1);
            assert_eq!(*code, ALLOC_ERROR);
            assert_eq!(*size, 4096);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(err.status(), ALLOC_ERROR);

    assert!(!sess.is_loaded());
    assert_eq!(memory.live(), 0);
    // output 0, then the inputs newest first
    assert_eq!(
        *memory.freed.borrow(),
        vec![0x4020_0000, 0x4010_0000, 0x4000_0000]
    );
    assert_eq!(runtime.live_handles(), 0);
}

#[test]
fn test_input_allocation_failure_releases_prior_inputs() {
    let runtime = Arc::new(MockRuntime::new(multi_io_info(1)));
    let memory = Arc::new(MockMemory::failing_at(1));
    let mut sess = session(&runtime, &memory);

    let err = sess.load(model_file("input-fail")).unwrap_err();
    assert!(matches!(
        err,
        Error::Allocation {
            direction: Direction::Input,
            index: 1,
            ..
        }
    ));
    assert_eq!(memory.live(), 0);
    assert_eq!(*memory.freed.borrow(), vec![0x4000_0000]);
    assert_eq!(memory.requests.borrow().len(), 2);
    assert_eq!(runtime.live_handles(), 0);
}

#[test]
fn test_release_is_idempotent() -> Result<(), Box<dyn StdError>> {
    let runtime = Arc::new(MockRuntime::new(depth_model_info()));
    let memory = Arc::new(MockMemory::new());
    let mut sess = session(&runtime, &memory);

    sess.release();
    sess.load(model_file("release-twice"))?;
    sess.release();
    sess.release();
    assert_eq!(runtime.destroyed.get(), 1);
    assert_eq!(memory.freed.borrow().len(), 2);
    Ok(())
}

#[test]
fn test_load_twice_keeps_first_model() -> Result<(), Box<dyn StdError>> {
    let runtime = Arc::new(MockRuntime::new(depth_model_info()));
    let memory = Arc::new(MockMemory::new());
    let mut sess = session(&runtime, &memory);
    let model = model_file("load-twice");

    sess.load(&model)?;
    sess.load(&model)?;
    assert_eq!(runtime.created.get(), 1);
    assert_eq!(memory.live(), 2);
    Ok(())
}

#[test]
fn test_nv12_model_params() -> Result<(), Box<dyn StdError>> {
    let runtime = Arc::new(MockRuntime::new(depth_model_info()));
    let memory = Arc::new(MockMemory::new());
    let mut sess = session(&runtime, &memory);

    sess.load(model_file("nv12-params"))?;
    assert_eq!(
        sess.params(),
        Some(AlgoParams {
            width: 384,
            height: 170,
            format: PixelFormat::Nv12,
        })
    );
    assert_eq!(sess.io_info().map(|i| i.outputs[0].name.as_str()), Some("depth"));
    Ok(())
}

#[test]
fn test_rgb_model_params() -> Result<(), Box<dyn StdError>> {
    let info = IoInfo {
        inputs: vec![TensorMeta::new("rgb", &[1, 224, 320, 3], 224 * 320 * 3, ColorSpace::Rgb)],
        outputs: vec![TensorMeta::new(
            "depth",
            &[1, 1, 224, 320],
            224 * 320 * 4,
            ColorSpace::Unspecified(0),
        )],
    };
    let runtime = Arc::new(MockRuntime::new(info));
    let memory = Arc::new(MockMemory::new());
    let mut sess = session(&runtime, &memory);

    sess.load(model_file("rgb-params"))?;
    let params = sess.params().ok_or("not loaded")?;
    assert_eq!((params.width, params.height), (320, 224));
    assert_eq!(params.format, PixelFormat::Rgb888);
    Ok(())
}

#[test]
fn test_unsupported_color_space() {
    let mut info = depth_model_info();
    info.inputs[0].color_space = ColorSpace::Unspecified(0);
    let runtime = Arc::new(MockRuntime::new(info));
    let memory = Arc::new(MockMemory::new());
    let mut sess = session(&runtime, &memory);

    let err = sess.load(model_file("bad-color")).unwrap_err();
    assert!(matches!(
        err,
        Error::UnsupportedColorFormat(ColorSpace::Unspecified(0))
    ));
    assert_eq!(err.status(), STATUS_FAILED);
    assert!(!sess.is_loaded());
    assert_eq!(memory.live(), 0);
    assert_eq!(runtime.live_handles(), 0);
}

#[test]
fn test_runtime_failures_tear_down() {
    let runtime = Arc::new(MockRuntime::new(depth_model_info()));
    let memory = Arc::new(MockMemory::new());
    let mut sess = session(&runtime, &memory);
    let model = model_file("runtime-fail");

    runtime.create_error.set(Some(0x8006_0001u32 as i32));
    let err = sess.load(&model).unwrap_err();
    assert!(matches!(err, Error::EngineCreate(_)));
    assert_eq!(err.status(), 0x8006_0001u32 as i32);
    assert_eq!(runtime.created.get(), 0);
    runtime.create_error.set(None);

    runtime.context_error.set(Some(0x8006_0002u32 as i32));
    let err = sess.load(&model).unwrap_err();
    assert!(matches!(err, Error::ContextCreate(_)));
    assert_eq!(runtime.live_handles(), 0);
    runtime.context_error.set(None);

    runtime.io_info_error.set(Some(0x8006_0003u32 as i32));
    let err = sess.load(&model).unwrap_err();
    assert!(matches!(err, Error::IoInfo(_)));
    assert_eq!(runtime.live_handles(), 0);
    assert!(memory.requests.borrow().is_empty());
    runtime.io_info_error.set(None);

    assert!(sess.load(&model).is_ok());
}

#[test]
fn test_missing_model_file() {
    let runtime = Arc::new(MockRuntime::new(depth_model_info()));
    let memory = Arc::new(MockMemory::new());
    let mut sess = session(&runtime, &memory);

    let err = sess
        .load(Path::new("/nonexistent/depth.axmodel"))
        .unwrap_err();
    assert!(matches!(err, Error::ModelRead { .. }));
    assert_eq!(runtime.created.get(), 0);
}

#[test]
fn test_empty_model_rejected() {
    let runtime = Arc::new(MockRuntime::new(IoInfo::default()));
    let memory = Arc::new(MockMemory::new());
    let mut sess = session(&runtime, &memory);

    let err = sess.load(model_file("empty")).unwrap_err();
    assert!(matches!(err, Error::InvalidShape(_)));
    assert_eq!(runtime.live_handles(), 0);
}

#[test]
fn test_infer_renders_overlay() -> Result<(), Box<dyn StdError>> {
    let runtime = Arc::new(MockRuntime::new(depth_model_info()));
    let memory = Arc::new(MockMemory::new());
    let mut sess = session(&runtime, &memory);
    sess.load(model_file("render"))?;

    let params = sess.params().ok_or("not loaded")?;
    let src_data: Vec<u8> = (0..PixelFormat::Nv12.frame_size(params.width, params.height))
        .map(|i| (i % 251) as u8)
        .collect();
    let src = VideoFrame::new(params.width, params.height, params.format, &src_data)?;

    let (w, h) = (640usize, 480usize);
    let mut dst_data = black_nv12(w, h);
    let mut dst = VideoFrameMut::new(w as u32, h as u32, PixelFormat::Nv12, &mut dst_data)?;
    sess.infer(&src, &mut dst)?;

    // the frame lands in the start of input 0
    let input = runtime.last_input.borrow();
    assert_eq!(&input[..src_data.len()], &src_data[..]);
    assert_eq!(memory.invalidated.get(), 1);

    assert_eq!(sess.renderer().overlay_size(), (192, 128));
    let luma = &dst_data[..w * h];
    let chroma = &dst_data[w * h..];
    // depth increases left to right, so does palette brightness
    assert!(luma[191] > luma[0] + 100, "{} {}", luma[0], luma[191]);
    assert!(luma[127 * w + 191] > luma[127 * w]);
    // outside the overlay is untouched
    assert_eq!(luma[192], 16);
    assert_eq!(luma[128 * w], 16);
    assert_eq!(luma[w * h - 1], 16);
    assert_eq!(chroma[192], 128);
    assert_eq!(chroma[64 * w], 128);
    assert!(chroma[..192].iter().any(|&c| c != 128));
    Ok(())
}

#[test]
fn test_short_frame_warns_once_per_model() -> Result<(), Box<dyn StdError>> {
    let logs = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .finish();

    tracing::subscriber::with_default(subscriber, || -> Result<(), Box<dyn StdError>> {
        let runtime = Arc::new(MockRuntime::new(depth_model_info()));
        let memory = Arc::new(MockMemory::new());
        let mut sess = session(&runtime, &memory);
        sess.load(model_file("short-frame"))?;

        // 384x170 NV12 is 97920 bytes, the 384x256 tensor holds 98304
        let params = sess.params().ok_or("not loaded")?;
        let src_data = vec![0x40u8; PixelFormat::Nv12.frame_size(params.width, params.height)];
        let src = VideoFrame::new(params.width, params.height, params.format, &src_data)?;
        let mut dst_data = black_nv12(640, 480);

        for _ in 0..5 {
            let mut dst = VideoFrameMut::new(640, 480, PixelFormat::Nv12, &mut dst_data)?;
            sess.infer(&src, &mut dst)?;
        }
        assert_eq!(runtime.runs.get(), 5);
        assert_eq!(logs.count("input buffer holds"), 1);

        sess.release();
        sess.load(model_file("short-frame"))?;
        let mut dst = VideoFrameMut::new(640, 480, PixelFormat::Nv12, &mut dst_data)?;
        sess.infer(&src, &mut dst)?;
        assert_eq!(logs.count("input buffer holds"), 2);
        Ok(())
    })
}

#[test]
fn test_infer_failure_skips_render() -> Result<(), Box<dyn StdError>> {
    let runtime = Arc::new(MockRuntime::new(depth_model_info()));
    let memory = Arc::new(MockMemory::new());
    let mut sess = session(&runtime, &memory);
    sess.load(model_file("run-fail"))?;
    runtime.run_error.set(Some(RUN_ERROR));

    let src_data = vec![0u8; DEPTH_WIDTH * DEPTH_HEIGHT];
    let src = VideoFrame::new(384, 170, PixelFormat::Nv12, &src_data)?;
    let mut dst_data = black_nv12(640, 480);
    let mut dst = VideoFrameMut::new(640, 480, PixelFormat::Nv12, &mut dst_data)?;

    let err = sess.infer(&src, &mut dst).unwrap_err();
    assert!(matches!(err, Error::Inference(RUN_ERROR)));
    assert_eq!(err.status(), STATUS_FAILED);
    assert_eq!(memory.invalidated.get(), 0);
    assert!(dst_data == black_nv12(640, 480));
    // still loaded, the next frame may succeed
    assert!(sess.is_loaded());
    Ok(())
}

#[test]
fn test_infer_rejects_oversized_frame() -> Result<(), Box<dyn StdError>> {
    let runtime = Arc::new(MockRuntime::new(depth_model_info()));
    let memory = Arc::new(MockMemory::new());
    let mut sess = session(&runtime, &memory);
    sess.load(model_file("oversized"))?;

    let src_data = vec![0u8; PixelFormat::Nv12.frame_size(384, 256)];
    let src = VideoFrame::new(384, 256, PixelFormat::Nv12, &src_data)?;
    let mut dst_data = black_nv12(640, 480);
    let mut dst = VideoFrameMut::new(640, 480, PixelFormat::Nv12, &mut dst_data)?;

    let err = sess.infer(&src, &mut dst).unwrap_err();
    assert!(matches!(
        err,
        Error::FrameSize {
            need: 98304,
            have: 147456
        }
    ));
    assert_eq!(runtime.runs.get(), 0);
    Ok(())
}

#[test]
fn test_infer_requires_model() -> Result<(), Box<dyn StdError>> {
    let runtime = Arc::new(MockRuntime::new(depth_model_info()));
    let memory = Arc::new(MockMemory::new());
    let mut sess = session(&runtime, &memory);

    let src_data = vec![0u8; PixelFormat::Nv12.frame_size(384, 170)];
    let src = VideoFrame::new(384, 170, PixelFormat::Nv12, &src_data)?;
    let mut dst_data = black_nv12(640, 480);
    let mut dst = VideoFrameMut::new(640, 480, PixelFormat::Nv12, &mut dst_data)?;
    assert!(matches!(sess.infer(&src, &mut dst), Err(Error::NotLoaded)));
    Ok(())
}

#[test]
fn test_drop_releases_model() -> Result<(), Box<dyn StdError>> {
    let runtime = Arc::new(MockRuntime::new(depth_model_info()));
    let memory = Arc::new(MockMemory::new());
    {
        let mut sess = session(&runtime, &memory);
        sess.load(model_file("drop"))?;
        assert_eq!(memory.live(), 2);
    }
    assert_eq!(memory.live(), 0);
    assert_eq!(runtime.live_handles(), 0);
    Ok(())
}

#[test]
fn test_pipeline_status_codes() -> Result<(), Box<dyn StdError>> {
    let runtime = Arc::new(MockRuntime::new(depth_model_info()));
    let memory = Arc::new(MockMemory::new());
    let mut pipe = pipeline(&runtime, &memory);
    let model = model_file("status");

    let src_data = vec![0u8; PixelFormat::Nv12.frame_size(384, 170)];
    let src = VideoFrame::new(384, 170, PixelFormat::Nv12, &src_data)?;
    let mut dst_data = black_nv12(1920, 1080);
    let mut dst = VideoFrameMut::new(1920, 1080, PixelFormat::Nv12, &mut dst_data)?;

    assert_eq!(pipe.inference_status(&src, &mut dst), STATUS_FAILED);

    runtime.create_error.set(Some(0x8006_0001u32 as i32));
    assert_eq!(pipe.load_status(&model), 0x8006_0001u32 as i32);
    runtime.create_error.set(None);

    assert_eq!(pipe.load_status(&model), 0);
    assert!(pipe.is_loaded());
    assert_eq!(pipe.inference_status(&src, &mut dst), 0);
    assert_eq!(pipe.inference_status(&src, &mut dst), 0);
    assert_eq!(pipe.frames(), 2);
    assert_eq!(pipe.session().renderer().overlay_size(), (576, 384));

    runtime.run_error.set(Some(RUN_ERROR));
    assert_eq!(pipe.inference_status(&src, &mut dst), STATUS_FAILED);
    assert_eq!(pipe.frames(), 2);

    assert_eq!(pipe.release_status(), 0);
    assert_eq!(pipe.release_status(), 0);
    assert!(!pipe.is_loaded());
    assert_eq!(memory.live(), 0);
    Ok(())
}
