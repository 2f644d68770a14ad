use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::IVec2;
use termfact::game::config::GameConfig;
use termfact::game::display::{DisplayConfig, DisplayMode};
use termfact::game::geometry::Direction;
use termfact::game::items::ProductCatalog;
use termfact::game::world::{Game, PlacementError, StructureId};
use termfact::sim::belt::BeltShape;
use termfact::sim::structure::Structure;
use termfact::sim::tick::Simulation;

/// Belts between the starter extractor and its chest.
const STARTER_BELTS: i32 = 4;
const VIEW_ROWS: i32 = 16;
const VIEW_COLS: i32 = 32;

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let seconds: u64 = if args.len() >= 2 {
        args[1].parse().expect("seconds must be a positive integer")
    } else {
        5
    };

    let config = GameConfig::load();
    let catalog = Arc::new(ProductCatalog::standard());
    let Some(mut game) = Game::generate(
        config.world.height,
        config.world.width,
        catalog,
        config.world.seed,
    ) else {
        log::error!(
            "Cannot generate a {}x{} world",
            config.world.width,
            config.world.height
        );
        std::process::exit(1);
    };

    let chest = lay_starter_line(&mut game, config.debug.free_placement);
    if chest.is_none() {
        log::warn!("No room for a starter line; running an empty world");
    }

    let display = DisplayConfig::from_section(&config.display);
    let sim =
        Simulation::spawn(game, &config.simulation).expect("failed to start simulation thread");

    let render_interval = Duration::from_millis(config.simulation.render_interval_ms.max(1));
    let deadline = Instant::now() + Duration::from_secs(seconds);
    let mut frames = 0u64;
    let mut frame = String::new();
    while Instant::now() < deadline {
        std::thread::sleep(render_interval);
        frame = sim.with_game(|game| {
            if config.debug.log_ticks {
                log::info!("tick {}", game.tick_count());
            }
            render_view(game, &display)
        });
        frames += 1;
    }

    let ticks = sim.ticks();
    let Some(game) = sim.stop() else {
        log::error!("Simulation did not shut down cleanly");
        std::process::exit(1);
    };

    println!("{frame}");
    log::info!("Ran {ticks} ticks and {frames} read passes in {seconds}s");
    if let Some(chest) = chest.and_then(|id| game.structure(id)).and_then(Structure::as_chest) {
        for (product, count) in chest.storage().contents(game.catalog()) {
            log::info!("Chest holds {count} {}", game.catalog().name(product));
        }
    }
}

/// Extractor over the first deposit found, a short belt line below it and a
/// chest at the end. Returns the chest.
fn lay_starter_line(game: &mut Game, free: bool) -> Option<StructureId> {
    let belt = Structure::belt(Direction::Down, BeltShape::Straight);
    let chest = Structure::chest();
    let extractor = Structure::extractor();
    let line_rows = 3 + STARTER_BELTS + 1;

    let site = (0..game.height() as i32 - line_rows + 1)
        .flat_map(|y| (0..game.width() as i32 - 2).map(move |x| IVec2::new(x, y)))
        .find(|origin| {
            let rich = (0..3).any(|dy| {
                (0..3).any(|dx| {
                    game.resource_at(origin.y + dy, origin.x + dx)
                        .is_some_and(|r| r.kind.is_some() && r.amount > 0)
                })
            });
            rich && game.can_place(origin.y, origin.x, &extractor).is_ok()
        })?;

    let place = |game: &mut Game,
                 y: i32,
                 x: i32,
                 ghost: &Structure|
     -> Result<StructureId, PlacementError> {
        if free {
            game.place_structure(y, x, ghost.copy_structure())
        } else {
            game.build(y, x, ghost)
        }
    };

    let result = (|| {
        place(game, site.y, site.x, &extractor)?;
        for i in 0..STARTER_BELTS {
            place(game, site.y + 3 + i, site.x + 1, &belt)?;
        }
        place(game, site.y + 3 + STARTER_BELTS, site.x + 1, &chest)
    })();

    match result {
        Ok(id) => {
            let offset = site - game.cursor();
            game.move_cursor(offset.x, offset.y);
            log::info!("Starter line at ({}, {})", site.x, site.y);
            Some(id)
        }
        Err(e) => {
            log::warn!("Starter line incomplete: {e}");
            None
        }
    }
}

/// Draw the area around the cursor, one line per map row.
fn render_view(game: &Game, display: &DisplayConfig) -> String {
    let cursor = game.cursor();
    let top = (cursor.y - VIEW_ROWS / 2).max(0);
    let left = (cursor.x - VIEW_COLS / 2).max(0);
    let mut out = String::new();
    for y in top..(top + VIEW_ROWS).min(game.height() as i32) {
        for x in left..(left + VIEW_COLS).min(game.width() as i32) {
            let mode = if IVec2::new(x, y) == cursor {
                DisplayMode::MapSelected
            } else {
                DisplayMode::Map
            };
            if let Some(cell) = game.display_cell(y, x, mode, display) {
                out.push_str(&cell.to_string());
            }
        }
        out.push('\n');
    }
    out
}
