//! Bind Source Demo
//!
//! This example consumes a remote stream through a loopback viewer frame
//! and binds it to a named input source, showing the cross-origin raster
//! relay branch: readiness handshake, owned surface, and per-frame
//! draw-and-release.

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use surfacecast::{
    BindStream, Drawable, FrameData, InputSource, LoopbackConfig, LoopbackHost, RenderEngine,
    Surface, Surfacecast, TextureHandle, TextureParams,
};
use tokio::time::sleep;

/// Stand-in render engine with named input sources
struct DemoEngine {
    output: Surface,
    sources: Vec<Arc<InputSource>>,
}

impl RenderEngine for DemoEngine {
    fn output_surface(&self) -> Surface {
        self.output.clone()
    }

    fn input_sources(&self) -> Vec<Arc<InputSource>> {
        self.sources.clone()
    }

    fn create_texture(&self, _drawable: &Drawable, _params: &TextureParams) -> TextureHandle {
        TextureHandle::allocate()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    println!("📺 Surfacecast Bind Source Demo");
    println!("===============================");

    let engine = Arc::new(DemoEngine {
        output: Surface::new(48, 48),
        sources: (0..2)
            .map(|index| Arc::new(InputSource::new(format!("s{index}"), index)))
            .collect(),
    });
    let host = Arc::new(LoopbackHost::new(LoopbackConfig::default()));
    let cast = Surfacecast::init(engine, host.clone())?;

    let source = cast.engine().source("s0").expect("engine has s0");
    println!("🔌 Binding remote stream 'guest-room' to input source s0");

    // The collaborator answers the handshake once the frame is attached.
    let driver = {
        let host = host.clone();
        tokio::spawn(async move {
            loop {
                if let Some(collaborator) = host.collaborator("guest-room") {
                    collaborator.announce_video_element(Some("stream-a"));
                    for shade in [60u8, 120, 180] {
                        let frame = collaborator
                            .frame(FrameData {
                                data: Bytes::from(vec![shade; 48 * 48 * 4]),
                                width: 48,
                                height: 48,
                                timestamp_ms: u64::from(shade),
                            })
                            .await;
                        let _ = collaborator.send_video_frame(frame);
                        sleep(Duration::from_millis(30)).await;
                    }
                    break;
                }
                sleep(Duration::from_millis(5)).await;
            }
        })
    };

    let bound = source
        .bind_stream(&cast, "guest-room", Default::default())
        .await?;
    println!("✅ Bound via: {:?}", bound.mode());

    driver.await?;
    sleep(Duration::from_millis(100)).await;

    if let surfacecast::BoundSource::RasterRelay(surface) = &bound {
        println!(
            "🖼️  Relay surface {}x{} drew {} frames",
            surface.dimensions().0,
            surface.dimensions().1,
            surface.draw_count()
        );
    }
    let collaborator = host.collaborator("guest-room").expect("frame attached");
    println!(
        "✅ Frame accounting: produced={} released={} leaked={}",
        collaborator.pool().produced(),
        collaborator.pool().released(),
        collaborator.pool().leaked()
    );
    println!(
        "🙈 Embedded frame hidden once content flowed: {}",
        cast.registry()
            .get("guest-room")
            .map(|entry| entry.frame().is_hidden())
            .unwrap_or(false)
    );
    println!("\n👋 Done");
    Ok(())
}
