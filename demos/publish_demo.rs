//! Publish Demo
//!
//! This example publishes a render surface into a loopback viewer frame and
//! shows the transport strategies: zero-copy capture when the processor is
//! available, and the automatic software fallback when setup fails.

use std::sync::Arc;
use std::time::Duration;
use surfacecast::{
    BoundaryMessage, Drawable, FramePayload, InputSource, LoopbackConfig, LoopbackHost,
    RenderEngine, Surface, Surfacecast, TextureHandle, TextureParams,
};

/// Stand-in render engine with a 64x64 output surface
struct DemoEngine {
    output: Surface,
}

impl RenderEngine for DemoEngine {
    fn output_surface(&self) -> Surface {
        self.output.clone()
    }

    fn input_sources(&self) -> Vec<Arc<InputSource>> {
        Vec::new()
    }

    fn create_texture(&self, _drawable: &Drawable, _params: &TextureParams) -> TextureHandle {
        TextureHandle::allocate()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    println!("🎥 Surfacecast Publish Demo");
    println!("===========================");

    let engine = Arc::new(DemoEngine {
        output: Surface::new(64, 64),
    });
    engine.output.fill([40, 80, 160, 255]);

    // Demo 1: zero-copy capture
    println!("\n🚀 Demo 1: Zero-Copy Capture");
    let host = Arc::new(LoopbackHost::new(LoopbackConfig::default()));
    let cast = Surfacecast::init(engine.clone(), host.clone())?;

    let started = cast
        .stream("DEMO1234")
        .room("studio")
        .frame_rate(30)
        .dimensions(64, 64)
        .settle_delay(Duration::ZERO)
        .start()
        .await?;
    println!("📡 Publishing on channel: {}", started.channel_id);
    println!("🔗 Share this view link: {}", started.view_link);
    println!("⚙️  Strategy: {:?}", started.strategy);

    let collaborator = host.collaborator("DEMO1234").expect("frame attached");
    for n in 1..=5 {
        if let Some(BoundaryMessage::CanvasFrame { frame, .. }) = collaborator.next_posted().await
        {
            match frame {
                FramePayload::Video(data) => {
                    println!("  frame {n}: zero-copy {}x{}", data.width, data.height)
                }
                FramePayload::Raster(raster) => {
                    println!("  frame {n}: raster {}", raster.media_type())
                }
            }
        }
    }
    if let Some(pool) = host.capture_pool() {
        println!(
            "✅ Frame accounting: produced={} released={} leaked={}",
            pool.produced(),
            pool.released(),
            pool.leaked()
        );
    }
    cast.stop_stream().await;

    // Demo 2: broken processor, automatic software fallback
    println!("\n🔄 Demo 2: Automatic Software Fallback");
    let host = Arc::new(LoopbackHost::new(LoopbackConfig {
        fail_processor_setup: true,
        ..LoopbackConfig::default()
    }));
    let cast = Surfacecast::init(engine, host.clone())?;
    let mut events = cast.events();

    cast.stream("DEMO1234")
        .settle_delay(Duration::ZERO)
        .start()
        .await?;

    while let Some(event) = events.next().await {
        println!("  event: {}", event.event_type());
        if event.event_type() == "frame_published" {
            break;
        }
    }
    let collaborator = host.collaborator("DEMO1234").expect("frame attached");
    if let Some(BoundaryMessage::CanvasFrame {
        frame: FramePayload::Raster(raster),
        ..
    }) = collaborator.next_posted().await
    {
        println!(
            "✅ Session survived on the fallback path: {} ({} bytes)",
            raster.media_type(),
            raster.bytes().len()
        );
    }
    cast.stop_stream().await;
    println!("\n👋 Done");
    Ok(())
}
