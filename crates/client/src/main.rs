use std::process::ExitCode;

use gdmc_client::{Editor, EditorConfig, HeightmapKind};

fn main() -> ExitCode {
    let host = std::env::args().skip_while(|a| a != "--host").nth(1);
    let dimension = std::env::args().skip_while(|a| a != "--dimension").nth(1);
    let load_slice = std::env::args().any(|a| a == "--slice");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut config = EditorConfig::from_env();
    if let Some(host) = host {
        config.host = host;
    }
    if dimension.is_some() {
        config.dimension = dimension;
    }

    let editor = match Editor::new(config) {
        Ok(editor) => editor,
        Err(e) => {
            tracing::error!("Failed to start editor: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = editor.check_connection() {
        tracing::error!("{}", e);
        return ExitCode::FAILURE;
    }

    match editor.minecraft_version() {
        Ok(version) => tracing::info!("Connected to {}, Minecraft {}", editor.config().host, version),
        Err(e) => tracing::warn!("Version query failed: {}", e),
    }

    let area = match editor.get_build_area() {
        Ok(area) => area,
        Err(e) => {
            tracing::warn!("{}", e);
            return ExitCode::SUCCESS;
        }
    };
    let last = area.last();
    tracing::info!(
        "Build area: ({}, {}, {}) to ({}, {}, {}), {} blocks",
        area.offset.x,
        area.offset.y,
        area.offset.z,
        last.x,
        last.y,
        last.z,
        area.volume()
    );

    if load_slice {
        // ── Snapshot the build area ──────────────────────────────
        let slice = match editor.load_world_slice(None, &[HeightmapKind::MotionBlockingNoLeaves]) {
            Ok(slice) => slice,
            Err(e) => {
                tracing::error!("Failed to load world slice: {}", e);
                return ExitCode::FAILURE;
            }
        };
        let rect = slice.rect();
        tracing::info!(
            "World slice: {} sections, y {}..{}",
            slice.section_count(),
            slice.y_begin(),
            slice.y_end()
        );
        if let Some(heights) = slice.heightmap(HeightmapKind::MotionBlockingNoLeaves) {
            let (cx, cz) = (rect.x + rect.size_x / 2, rect.z + rect.size_z / 2);
            if let Some(h) = heights.get(cx, cz) {
                let surface = gdmc_client::BlockPos::new(cx, h - 1, cz);
                tracing::info!(
                    "Surface at build area centre: {} on {} in {}",
                    h,
                    slice.block(surface),
                    slice.biome(surface)
                );
            }
        }
    }

    ExitCode::SUCCESS
}
