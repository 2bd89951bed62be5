//! Build a small 3-D grid, edit it by index path, and tear it down.
//!
//! Run with `RUST_LOG=omnivec_arena=trace` to see every reallocation.

use omnivec::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let reg = TypeRegistry::with_config(EngineConfig::default())?;
    let cell = reg.require("f32")?;

    let mut grid = Container::with_dimensions(&reg, cell, &[2, 3, 4])?;
    info!(shape = ?grid.shape(&reg), "grid built");

    for i in 0..2 {
        for j in 0..3 {
            for k in 0..4 {
                grid.set(&reg, &index_path![i, j, k], (i * 12 + j * 4 + k) as f32)?;
            }
        }
    }
    info!(value = *grid.get::<f32>(&reg, &[1, 2, 3])?, "corner cell");

    if let Err(err) = grid.remove_at(&reg, &[0, 0, 0, 0]) {
        info!(%err, "rejected over-deep path");
    }

    let mut words = Container::new(&reg, reg.require(TypeRegistry::STRING)?)?;
    for w in ["alpha", "beta", "gamma"] {
        words.append(&reg, w.to_string())?;
    }
    let mut copy = words.slice(&reg, 1, 3)?;
    words.splice_insert(&reg, &copy, 0)?;
    info!(words = ?words.as_slice::<String>(&reg)?, "spliced");

    copy.destroy(&reg);
    words.destroy(&reg);
    grid.destroy(&reg);
    reg.teardown();
    Ok(())
}
