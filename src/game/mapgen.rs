use std::sync::Arc;

use glam::IVec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::items::ProductCatalog;
use super::world::{Game, RawResource};

const MIN_CLUSTERS: u32 = 10;
const EXTRA_CLUSTERS: u32 = 4;
/// Minimum distance between cluster centres.
const CLUSTER_SPACING: f32 = 20.0;
/// Centre candidates tried per cluster before accepting a crowded one.
const PLACEMENT_ATTEMPTS: u32 = 64;
/// The second focus lies within this many cells of the centre.
const FOCUS_SPREAD: i32 = 4;
const BASE_RADIUS: f32 = 10.0;
const RADIUS_SPREAD: f32 = 6.0;

impl Game {
    /// Generate a world with resource clusters. `None` for a non-positive size.
    /// A seed makes the map reproducible.
    pub fn generate(
        height: i32,
        width: i32,
        catalog: Arc<ProductCatalog>,
        seed: Option<u64>,
    ) -> Option<Self> {
        let mut rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        generate_with(height, width, catalog, &mut rng)
    }
}

pub fn generate_with(
    height: i32,
    width: i32,
    catalog: Arc<ProductCatalog>,
    rng: &mut impl Rng,
) -> Option<Game> {
    if height <= 0 || width <= 0 {
        return None;
    }
    let kinds = catalog.resource_kinds();
    let mut game = Game::new(height as usize, width as usize, catalog);
    if kinds == 0 {
        return Some(game);
    }

    let clusters = MIN_CLUSTERS + rng.gen_range(0..EXTRA_CLUSTERS);
    let mut centres: Vec<IVec2> = Vec::with_capacity(clusters as usize);
    for _ in 0..clusters {
        centres.push(pick_centre(&centres, height, width, rng));
    }

    for (index, &centre) in centres.iter().enumerate() {
        let focus = centre + IVec2::new(
            rng.gen_range(-FOCUS_SPREAD..=FOCUS_SPREAD),
            rng.gen_range(-FOCUS_SPREAD..=FOCUS_SPREAD),
        );
        let reach = BASE_RADIUS + rng.gen::<f32>() * RADIUS_SPREAD;
        let margin = reach.ceil() as i32;
        let min = centre.min(focus) - IVec2::splat(margin);
        let max = centre.max(focus) + IVec2::splat(margin);
        let kind = index % kinds;
        let mut cells = 0u32;

        for y in min.y..=max.y {
            for x in min.x..=max.x {
                if !game.within_bounds(x, y) {
                    continue;
                }
                let p = IVec2::new(x, y).as_vec2();
                if p.distance(centre.as_vec2()) + p.distance(focus.as_vec2()) > reach {
                    continue;
                }
                let amount = roll_amount(rng);
                game.set_resource(y, x, RawResource::new(amount, Some(kind)));
                cells += 1;
            }
        }
        log::debug!(
            "Cluster {index} at ({}, {}): {cells} cells of kind {kind}",
            centre.x,
            centre.y
        );
    }

    log::info!("Generated {width}x{height} map with {clusters} resource clusters");
    Some(game)
}

fn pick_centre(existing: &[IVec2], height: i32, width: i32, rng: &mut impl Rng) -> IVec2 {
    let mut candidate = IVec2::ZERO;
    for _ in 0..PLACEMENT_ATTEMPTS {
        candidate = IVec2::new(rng.gen_range(0..width), rng.gen_range(0..height));
        let crowded = existing
            .iter()
            .any(|c| c.as_vec2().distance(candidate.as_vec2()) < CLUSTER_SPACING);
        if !crowded {
            break;
        }
    }
    candidate
}

/// 70% poor, 20% rich, 10% very rich.
fn roll_amount(rng: &mut impl Rng) -> u32 {
    let base = match rng.gen_range(0..10) {
        0..=6 => 0,
        7..=8 => 100,
        _ => 200,
    };
    base + rng.gen_range(0..100)
}
