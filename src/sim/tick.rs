use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use glam::IVec2;
use smallvec::SmallVec;

use crate::game::config::SimulationConfig;
use crate::game::geometry::{PortKind, Transfer};
use crate::game::world::{Game, StructureId};

/// Longest stretch of wall time the clock will try to catch up on.
const MAX_FRAME_TIME: Duration = Duration::from_millis(250);

impl Game {
    /// Advance the world by one tick: service splitters, then walk upstream
    /// from every root, pulling at most one product into each structure.
    pub fn tick(&mut self) {
        self.tick_count += 1;
        self.tick_splitters();
        self.walk_roots();
    }

    fn tick_splitters(&mut self) {
        let catalog = Arc::clone(&self.catalog);
        let splitters: Vec<(StructureId, IVec2)> = self.splitters().collect();
        for &(id, _) in &splitters {
            if let Some(splitter) = self.structures.get_mut(id) {
                splitter.tick(&catalog);
            }
        }
        for (id, origin) in splitters {
            for port in self.input_ports(id) {
                if let Some((producer, _)) =
                    self.get_neighbour(port.at(origin), port.direction, PortKind::Input)
                {
                    self.transfer(producer, id);
                }
            }
        }
    }

    /// Each structure is ticked at most once, even when several roots reach it.
    fn walk_roots(&mut self) {
        let catalog = Arc::clone(&self.catalog);
        let mut pending: Vec<(StructureId, IVec2)> = self.roots().collect();
        pending.reverse();
        let mut visited: HashSet<StructureId> = pending.iter().map(|&(id, _)| id).collect();

        while let Some((id, origin)) = pending.pop() {
            let Some(structure) = self.structures.get_mut(id) else {
                continue;
            };
            structure.tick(&catalog);

            let mut filled = false;
            for port in self.input_ports(id) {
                let Some((producer, producer_origin)) =
                    self.get_neighbour(port.at(origin), port.direction, PortKind::Input)
                else {
                    continue;
                };
                // Splitters were serviced in the first phase and are not walked,
                // but they still deliver to whoever pulls from them.
                if !self.splitters.contains_key(&producer) && visited.insert(producer) {
                    pending.push((producer, producer_origin));
                }
                if filled || self.structures[id].can_retrieve_product().is_ready() {
                    continue;
                }
                filled = self.transfer(producer, id);
            }
        }
    }

    fn input_ports(&self, id: StructureId) -> SmallVec<[Transfer; 4]> {
        self.structures
            .get(id)
            .map(|s| SmallVec::from_slice(s.inputs()))
            .unwrap_or_default()
    }

    /// Move one ready product from `from` to `to` if `to` will take it.
    fn transfer(&mut self, from: StructureId, to: StructureId) -> bool {
        let Some(product) = self
            .structures
            .get(from)
            .and_then(|s| s.can_retrieve_product().ready())
        else {
            return false;
        };
        if !self.structures.get(to).is_some_and(|s| s.can_accept_product(product)) {
            return false;
        }
        let Some(product) = self.structures.get_mut(from).and_then(|s| s.retrieve_product()) else {
            return false;
        };
        let accepted = self
            .structures
            .get_mut(to)
            .is_some_and(|s| s.accept_product(product));
        if !accepted {
            log::warn!(
                "tick {}: {to:?} refused {} after offering room; {from:?} lost it",
                self.tick_count,
                self.catalog.name(product)
            );
            return false;
        }
        log::trace!(
            "tick {}: {} moved {from:?} -> {to:?}",
            self.tick_count,
            self.catalog.name(product)
        );
        true
    }
}

/// Divides timer beats into game ticks: every `period`-th beat is a tick.
#[derive(Clone, Debug)]
pub struct TickThrottle {
    period: u32,
    count: u32,
}

impl TickThrottle {
    pub fn new(period: u32) -> Self {
        Self {
            period: period.max(1),
            count: 0,
        }
    }

    /// Count one beat. Returns true when a game tick is due.
    pub fn beat(&mut self) -> bool {
        self.count += 1;
        if self.count >= self.period {
            self.count = 0;
            return true;
        }
        false
    }
}

/// Fixed-step clock: converts elapsed wall time into a whole number of
/// timer beats and tracks the achieved beat rate.
pub struct SimClock {
    step: Duration,
    accumulator: Duration,
    last_frame: Option<Instant>,
    ups_beats: u32,
    ups_timer: Duration,
    pub ups: f64,
}

impl SimClock {
    pub fn new(step: Duration) -> Self {
        Self {
            step: step.max(Duration::from_millis(1)),
            accumulator: Duration::ZERO,
            last_frame: None,
            ups_beats: 0,
            ups_timer: Duration::ZERO,
            ups: 0.0,
        }
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    /// Time since the previous call, capped. `None` on the first call.
    pub fn begin_frame(&mut self) -> Option<Duration> {
        let now = Instant::now();
        let dt = self
            .last_frame
            .map(|last| now.duration_since(last).min(MAX_FRAME_TIME));
        self.last_frame = Some(now);
        dt
    }

    /// Accumulate frame time and return how many beats are due.
    pub fn accumulate(&mut self, frame_dt: Duration) -> u32 {
        self.accumulator += frame_dt;
        self.ups_timer += frame_dt;

        let mut beats = 0u32;
        while self.accumulator >= self.step {
            self.accumulator -= self.step;
            beats += 1;
        }

        self.ups_beats += beats;
        if self.ups_timer >= Duration::from_secs(1) {
            self.ups = self.ups_beats as f64 / self.ups_timer.as_secs_f64();
            self.ups_beats = 0;
            self.ups_timer = Duration::ZERO;
        }
        beats
    }
}

fn lock(game: &Mutex<Game>) -> MutexGuard<'_, Game> {
    game.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A game ticking on its own thread. Each tick holds the game lock for its
/// whole duration, so callers of [`Simulation::with_game`] never observe a
/// half-finished tick.
pub struct Simulation {
    game: Arc<Mutex<Game>>,
    stop: Arc<AtomicBool>,
    ticks: Arc<AtomicU64>,
    worker: Option<JoinHandle<()>>,
}

impl Simulation {
    pub fn spawn(game: Game, config: &SimulationConfig) -> std::io::Result<Self> {
        let game = Arc::new(Mutex::new(game));
        let stop = Arc::new(AtomicBool::new(false));
        let ticks = Arc::new(AtomicU64::new(0));
        let mut clock = SimClock::new(Duration::from_millis(config.tick_interval_ms));
        let mut throttle = TickThrottle::new(config.ticks_per_step);

        let worker = {
            let game = Arc::clone(&game);
            let stop = Arc::clone(&stop);
            let ticks = Arc::clone(&ticks);
            std::thread::Builder::new()
                .name("simulation".to_string())
                .spawn(move || {
                    log::info!("Simulation started: {:?} per beat", clock.step());
                    while !stop.load(Ordering::Relaxed) {
                        std::thread::sleep(clock.step());
                        let Some(dt) = clock.begin_frame() else {
                            continue;
                        };
                        for _ in 0..clock.accumulate(dt) {
                            if throttle.beat() {
                                lock(&game).tick();
                                ticks.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                    }
                    log::info!("Simulation stopped at {:.0} beats/s", clock.ups);
                })?
        };

        Ok(Self {
            game,
            stop,
            ticks,
            worker: Some(worker),
        })
    }

    /// Run `f` with exclusive access to the game, between two ticks.
    pub fn with_game<R>(&self, f: impl FnOnce(&mut Game) -> R) -> R {
        f(&mut lock(&self.game))
    }

    /// Ticks run since the simulation started.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("Simulation thread panicked");
            }
        }
    }

    /// Stop ticking and hand the game back.
    pub fn stop(mut self) -> Option<Game> {
        self.shutdown();
        let game = Arc::clone(&self.game);
        drop(self);
        Arc::try_unwrap(game)
            .ok()
            .map(|m| m.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::geometry::Direction;
    use crate::game::items::{ProductCatalog, ProductId};
    use crate::game::world::RawResource;
    use crate::sim::belt::{BeltShape, BELT_DELAY};
    use crate::sim::chest::CHEST_CAPACITY;
    use crate::sim::extractor::EXTRACTOR_DELAY;
    use crate::sim::splitter::SPLITTER_DELAY;
    use crate::sim::structure::{Machine, Offer, Structure};

    fn game(height: usize, width: usize) -> Game {
        Game::new(height, width, Arc::new(ProductCatalog::standard()))
    }

    fn belt_down() -> Structure {
        Structure::belt(Direction::Down, BeltShape::Straight)
    }

    fn run(g: &mut Game, ticks: u32) {
        for _ in 0..ticks {
            g.tick();
        }
    }

    fn product(g: &Game, name: &str) -> ProductId {
        g.catalog().by_name(name).unwrap()
    }

    fn offer_at(g: &Game, y: i32, x: i32) -> Offer {
        let (id, _) = g.get_structure_at(y, x).unwrap();
        g.structure(id).unwrap().can_retrieve_product()
    }

    #[test]
    fn test_extractor_feeds_belt() {
        let mut g = game(12, 12);
        g.set_resource(6, 6, RawResource::new(50, Some(0)));
        let copper = product(&g, "copper");
        g.place_structure(5, 5, Structure::extractor()).unwrap();
        // Output port sits at (x 6, y 7) flowing down.
        let belt = g.place_structure(8, 6, belt_down()).unwrap();
        assert!(g.is_root(belt));

        run(&mut g, EXTRACTOR_DELAY);
        assert_eq!(offer_at(&g, 5, 5), Offer::Ready(copper));
        assert_eq!(g.resource_at(6, 6).unwrap().amount, 49);
        assert_eq!(offer_at(&g, 8, 6), Offer::Empty);

        // Next tick the belt pulls, and the idle extractor mines again.
        run(&mut g, 1);
        assert_eq!(offer_at(&g, 8, 6), Offer::Pending(copper));
        assert_eq!(g.resource_at(6, 6).unwrap().amount, 48);

        run(&mut g, BELT_DELAY - 1);
        assert_eq!(offer_at(&g, 8, 6), Offer::Ready(copper));
    }

    #[test]
    fn test_belt_chain_moves_one_hop_per_delay() {
        let mut g = game(10, 3);
        let iron = product(&g, "iron");
        let first = g.place_structure(0, 1, belt_down()).unwrap();
        g.place_structure(1, 1, belt_down()).unwrap();
        g.place_structure(2, 1, belt_down()).unwrap();
        assert!(g.structure_mut(first).unwrap().accept_product(iron));

        run(&mut g, BELT_DELAY - 1);
        assert_eq!(offer_at(&g, 0, 1), Offer::Ready(iron));
        run(&mut g, 1);
        assert_eq!(offer_at(&g, 0, 1), Offer::Empty);
        assert_eq!(offer_at(&g, 1, 1), Offer::Pending(iron));
        run(&mut g, BELT_DELAY - 1);
        run(&mut g, 1);
        assert_eq!(offer_at(&g, 2, 1), Offer::Pending(iron));
    }

    #[test]
    fn test_splitter_keeps_arrival_order() {
        let mut g = game(10, 10);
        let iron = product(&g, "iron");
        let copper = product(&g, "copper");
        let left = g.place_structure(4, 5, belt_down()).unwrap();
        let right = g.place_structure(4, 6, belt_down()).unwrap();
        let splitter = g.place_structure(5, 5, Structure::splitter()).unwrap();
        assert!(g.structure_mut(left).unwrap().accept_product(iron));
        assert!(g.structure_mut(right).unwrap().accept_product(copper));

        // Belts get ready after BELT_DELAY - 1 ticks; the splitter pulls on the next.
        run(&mut g, BELT_DELAY);
        assert_eq!(offer_at(&g, 4, 5), Offer::Empty);
        assert_eq!(offer_at(&g, 4, 6), Offer::Empty);

        run(&mut g, SPLITTER_DELAY - 1);
        let s = g.structure_mut(splitter).unwrap();
        assert_eq!(s.retrieve_product(), Some(iron));
        assert_eq!(s.retrieve_product(), Some(copper));
        assert_eq!(s.retrieve_product(), None);
    }

    #[test]
    fn test_splitter_output_reaches_belts() {
        let mut g = game(10, 10);
        let iron = product(&g, "iron");
        let feeder = g.place_structure(0, 2, belt_down()).unwrap();
        g.place_structure(1, 2, Structure::splitter()).unwrap();
        g.place_structure(2, 2, belt_down()).unwrap();
        let tail = g.place_structure(2, 3, belt_down()).unwrap();
        assert!(g.is_root(tail));
        assert!(g.structure_mut(feeder).unwrap().accept_product(iron));

        run(&mut g, BELT_DELAY + SPLITTER_DELAY);
        let arrived = [offer_at(&g, 2, 2), offer_at(&g, 2, 3)];
        assert_eq!(arrived.iter().filter(|o| o.product() == Some(iron)).count(), 1);
    }

    #[test]
    fn test_factory_line_produces_gear() {
        let mut g = game(12, 12);
        let catalog = g.catalog().clone();
        let iron = product(&g, "iron");
        let gear = product(&g, "gear");
        let recipe = catalog.recipes().recipes_for(gear)[0].clone();
        // Feed the left input at (x 2, y 2) from a belt above it.
        let feeder = g.place_structure(1, 2, belt_down()).unwrap();
        g.place_structure(2, 2, Structure::factory()).unwrap();
        assert!(g.set_recipe(2, 2, Some(recipe.clone())));
        let out = g.place_structure(5, 3, belt_down()).unwrap();
        assert!(g.is_root(out));

        for _ in 0..4 {
            assert!(g.structure_mut(feeder).unwrap().accept_product(iron));
            run(&mut g, BELT_DELAY);
        }
        run(&mut g, recipe.production_ticks + 2);
        assert_eq!(g.structure(out).unwrap().can_retrieve_product().product(), Some(gear));
    }

    #[test]
    fn test_chest_collects_from_belt() {
        let mut g = game(10, 10);
        let stone = product(&g, "stone");
        let belt = g.place_structure(0, 0, belt_down()).unwrap();
        let chest = g.place_structure(1, 0, Structure::chest()).unwrap();
        assert!(g.is_root(chest));
        assert!(!g.is_root(belt));
        g.structure_mut(belt).unwrap().accept_product(stone);
        run(&mut g, BELT_DELAY);
        let stored = g.structure(chest).unwrap().as_chest().unwrap().storage().count(stone);
        assert_eq!(stored, 1);
    }

    #[test]
    fn test_full_splitter_leaves_product_on_belt() {
        let mut g = game(10, 10);
        let iron = product(&g, "iron");
        let copper = product(&g, "copper");
        let gear = product(&g, "gear");
        let left = g.place_structure(4, 5, belt_down()).unwrap();
        let right = g.place_structure(4, 6, belt_down()).unwrap();
        // Nothing drains the splitter.
        let splitter = g.place_structure(5, 5, Structure::splitter()).unwrap();
        g.structure_mut(left).unwrap().accept_product(iron);
        g.structure_mut(right).unwrap().accept_product(copper);
        run(&mut g, BELT_DELAY);

        assert!(g.structure_mut(left).unwrap().accept_product(gear));
        run(&mut g, BELT_DELAY + SPLITTER_DELAY);
        assert_eq!(offer_at(&g, 4, 5), Offer::Ready(gear));
        let Machine::Splitter(queue) = g.structure(splitter).unwrap().machine() else {
            panic!("not a splitter");
        };
        assert_eq!(queue.products().collect::<Vec<_>>(), [iron, copper]);
    }

    #[test]
    fn test_full_chest_leaves_product_on_belt() {
        let mut g = game(10, 10);
        let catalog = g.catalog().clone();
        let stone = product(&g, "stone");
        let belt = g.place_structure(0, 0, belt_down()).unwrap();
        let chest = g.place_structure(1, 0, Structure::chest()).unwrap();
        for _ in 0..CHEST_CAPACITY {
            assert!(g.structure_mut(chest).unwrap().accept_product(stone));
        }
        g.structure_mut(belt).unwrap().accept_product(stone);
        run(&mut g, BELT_DELAY * 2);
        assert_eq!(offer_at(&g, 0, 0), Offer::Ready(stone));
        let stored = g.structure(chest).unwrap().as_chest().unwrap().storage().contents(&catalog);
        assert_eq!(stored, [(stone, CHEST_CAPACITY)]);
    }

    #[test]
    fn test_one_transfer_in_per_tick() {
        let mut g = game(12, 12);
        let catalog = g.catalog().clone();
        let plate = product(&g, "plate");
        let gear = product(&g, "gear");
        let belt = product(&g, "belt");
        let recipe = catalog.recipes().recipes_for(belt)[0].clone();
        let left = g.place_structure(1, 2, belt_down()).unwrap();
        let right = g.place_structure(1, 4, belt_down()).unwrap();
        let factory = g.place_structure(2, 2, Structure::factory()).unwrap();
        g.set_recipe(2, 2, Some(recipe));
        assert!(g.is_root(factory));
        g.structure_mut(left).unwrap().accept_product(plate);
        g.structure_mut(right).unwrap().accept_product(gear);

        run(&mut g, BELT_DELAY - 1);
        assert_eq!(offer_at(&g, 1, 2), Offer::Ready(plate));
        assert_eq!(offer_at(&g, 1, 4), Offer::Ready(gear));

        run(&mut g, 1);
        let f = g.structure(factory).unwrap().as_factory().unwrap();
        assert_eq!(f.received(plate), 1);
        assert_eq!(f.received(gear), 0);
        assert_eq!(offer_at(&g, 1, 4), Offer::Ready(gear));

        run(&mut g, 1);
        assert_eq!(g.structure(factory).unwrap().as_factory().unwrap().received(gear), 1);
        run(&mut g, 1);
        assert!(g.structure(factory).unwrap().as_factory().unwrap().is_producing());
    }

    #[test]
    fn test_closed_loop_is_not_walked() {
        let mut g = game(4, 4);
        let iron = product(&g, "iron");
        // Four belts turning clockwise round a 2×2 square.
        let ring = [
            (0, 0, Direction::Up),
            (0, 1, Direction::Right),
            (1, 1, Direction::Down),
            (1, 0, Direction::Left),
        ];
        let mut ids = Vec::new();
        for (y, x, entry) in ring {
            ids.push(g.place_structure(y, x, Structure::belt(entry, BeltShape::TurnCw)).unwrap());
        }
        assert_eq!(g.roots().count(), 0);
        g.structure_mut(ids[0]).unwrap().accept_product(iron);
        run(&mut g, 5);
        assert_eq!(g.tick_count(), 5);
        assert_eq!(offer_at(&g, 0, 0), Offer::Pending(iron));
    }

    #[test]
    fn test_throttle_period() {
        let mut throttle = TickThrottle::new(3);
        let beats: Vec<bool> = (0..7).map(|_| throttle.beat()).collect();
        assert_eq!(beats, [false, false, true, false, false, true, false]);
        let mut every = TickThrottle::new(0);
        assert!(every.beat());
    }

    #[test]
    fn test_clock_accumulates_whole_steps() {
        let mut clock = SimClock::new(Duration::from_millis(10));
        assert_eq!(clock.accumulate(Duration::from_millis(25)), 2);
        assert_eq!(clock.accumulate(Duration::from_millis(5)), 1);
        assert_eq!(clock.accumulate(Duration::from_millis(9)), 0);
        assert!(clock.begin_frame().is_none());
        assert!(clock.begin_frame().is_some());
    }

    #[test]
    fn test_simulation_runs_and_returns_game() {
        let config = SimulationConfig {
            tick_interval_ms: 1,
            ticks_per_step: 1,
            render_interval_ms: 1,
        };
        let sim = Simulation::spawn(game(5, 5), &config).expect("spawn");
        let deadline = Instant::now() + Duration::from_secs(5);
        while sim.ticks() < 5 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        let seen = sim.with_game(|g| g.tick_count());
        assert!(seen >= 5);
        let ticks = sim.ticks();
        let game = sim.stop().expect("game returned");
        assert!(game.tick_count() >= ticks);
    }
}
