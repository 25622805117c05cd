//! Game session flow: lives, levels, scoring, and the scheduled
//! choreography around them.
//!
//! The driver subscribes TICK at [`GameDriver::TICK_PRIORITY`] -- above
//! the scheduler's band -- so by the time a tick reaches it, the clock
//! has advanced and every due timeout has already fired. Menus, input
//! binding, rendering, and audio live outside this crate; the driver
//! only speaks bus events and exposes save/load at its boundary.

use std::cell::{Cell, Ref, RefCell};
use std::rc::Rc;

use tracing::{debug, info};

use chomp_core::error::FormatError;
use chomp_core::event::{EventArgs, EventBus, EventId, Payload, Pickup, Sender};
use chomp_core::fixed::{Fixed64, Ticks};
use chomp_core::geometry::{Direction, Vec2};
use chomp_core::id::ActorTag;
use chomp_core::scheduler::Scheduler;

use crate::actor::{Kind, PlayerLife, PlayerMotion};
use crate::config::GameConfig;
use crate::field::Field;
use crate::ghost::{GhostAlert, GhostPen, GhostRoutine};
use crate::grid::Grid;
use crate::save::{self, GameSection, InfoSection, SaveData};

// ---------------------------------------------------------------------------
// Modes & difficulty
// ---------------------------------------------------------------------------

/// The session-level mode of the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameMode {
    /// No session loaded.
    Idle,
    /// Session built, waiting for the scheduled GAME_START.
    Wait,
    /// Normal play: session stats advance and the field updates.
    Play,
    /// The field still animates but session stats are frozen (death and
    /// level-clear interludes).
    Free,
    Win,
    Lose,
}

/// Difficulty selects the ghosts' starting routine. Wire names are the
/// stable save-file spellings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Difficulty {
    Easy,
    Normal,
    Hard,
}

impl Difficulty {
    pub fn name(self) -> &'static str {
        match self {
            Difficulty::Easy => "EASY",
            Difficulty::Normal => "NORMAL",
            Difficulty::Hard => "HARD",
        }
    }

    pub fn from_name(name: &str) -> Result<Difficulty, FormatError> {
        match name {
            "EASY" => Ok(Difficulty::Easy),
            "NORMAL" => Ok(Difficulty::Normal),
            "HARD" => Ok(Difficulty::Hard),
            _ => Err(FormatError::UnknownName {
                field: "difficulty",
                value: name.to_owned(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The state of one game in progress.
pub struct Session {
    /// Session play time in ticks; advances only while PLAY.
    pub time: Ticks,
    pub grid_name: String,
    pub difficulty: Difficulty,
    pub level: u32,
    pub scores: u32,
    pub lives: u32,
    /// Dots left to clear this level.
    pub dots: u32,
    /// Pristine grid used to rebuild the field on level change.
    grid_template: Grid,
    pub field: Rc<Field>,
}

// ---------------------------------------------------------------------------
// GameDriver
// ---------------------------------------------------------------------------

/// Orchestrates game sessions on top of the kernel.
pub struct GameDriver {
    bus: Rc<EventBus>,
    scheduler: Rc<Scheduler>,
    config: GameConfig,
    seed: u64,
    mode: Cell<GameMode>,
    session: RefCell<Option<Session>>,
}

impl GameDriver {
    /// The TICK priority band for session logic; must sit above the
    /// scheduler's so scheduled events land first.
    pub const TICK_PRIORITY: i32 = 2;

    pub fn new(
        bus: Rc<EventBus>,
        scheduler: Rc<Scheduler>,
        config: GameConfig,
        seed: u64,
    ) -> Rc<Self> {
        let driver = Rc::new(Self {
            bus: Rc::clone(&bus),
            scheduler,
            config,
            seed,
            mode: Cell::new(GameMode::Idle),
            session: RefCell::new(None),
        });

        let weak = Rc::downgrade(&driver);
        bus.subscribe(
            EventId::Tick,
            Rc::new(move |args| {
                if let Some(driver) = weak.upgrade() {
                    driver.on_tick(args);
                }
            }),
            Self::TICK_PRIORITY,
        );
        let weak = Rc::downgrade(&driver);
        bus.subscribe(
            EventId::Pickup,
            Rc::new(move |args| {
                if let Some(driver) = weak.upgrade() {
                    driver.on_pickup(args);
                }
            }),
            0,
        );
        let weak = Rc::downgrade(&driver);
        bus.subscribe(
            EventId::GameStart,
            Rc::new(move |_| {
                if let Some(driver) = weak.upgrade() {
                    driver.mode.set(GameMode::Play);
                    info!("round started");
                }
            }),
            0,
        );
        let weak = Rc::downgrade(&driver);
        bus.subscribe(
            EventId::GameEnd,
            Rc::new(move |_| {
                if let Some(driver) = weak.upgrade() {
                    driver.mode.set(GameMode::Lose);
                    info!("game over");
                }
            }),
            0,
        );
        let weak = Rc::downgrade(&driver);
        bus.subscribe(
            EventId::GameRestart,
            Rc::new(move |_| {
                if let Some(driver) = weak.upgrade() {
                    driver.on_restart();
                }
            }),
            0,
        );
        let weak = Rc::downgrade(&driver);
        bus.subscribe(
            EventId::NextLevel,
            Rc::new(move |_| {
                if let Some(driver) = weak.upgrade() {
                    driver.on_next_level();
                }
            }),
            0,
        );
        let weak = Rc::downgrade(&driver);
        bus.subscribe(
            EventId::SwitchTimeout,
            Rc::new(move |_| {
                if let Some(driver) = weak.upgrade() {
                    driver
                        .scheduler
                        .schedule(driver.config.switch_period, EventId::SwitchTimeout);
                }
            }),
            0,
        );

        driver
    }

    pub fn mode(&self) -> GameMode {
        self.mode.get()
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// The current session, if any.
    pub fn session(&self) -> Ref<'_, Option<Session>> {
        self.session.borrow()
    }

    /// The current field, if a session is loaded.
    pub fn field(&self) -> Option<Rc<Field>> {
        self.session.borrow().as_ref().map(|s| Rc::clone(&s.field))
    }

    // -----------------------------------------------------------------------
    // Session lifecycle
    // -----------------------------------------------------------------------

    /// Start a fresh game on the given grid.
    pub fn new_game(&self, difficulty: Difficulty, grid_name: &str, grid: Grid) {
        self.reset();
        let field = Field::new(Rc::clone(&self.bus), grid.clone(), self.seed);
        let dots = grid.dot_count();
        *self.session.borrow_mut() = Some(Session {
            time: 0,
            grid_name: grid_name.to_owned(),
            difficulty,
            level: 1,
            scores: 0,
            lives: self.config.start_lives,
            dots,
            grid_template: grid,
            field,
        });
        info!(grid = grid_name, difficulty = difficulty.name(), "new game");
        self.bus
            .fire(EventId::GameInit, EventArgs::empty(Sender::Driver));
        self.begin_round();
    }

    /// Tear the session down: pending timers dropped, actors destroyed.
    pub fn reset(&self) {
        self.scheduler.reset();
        if let Some(session) = self.session.borrow_mut().take() {
            session.field.destroy_actors();
        }
        self.mode.set(GameMode::Idle);
    }

    /// Spawn the wave of actors and schedule the round choreography.
    /// Used by both a fresh game and every restart.
    fn begin_round(&self) {
        let (field, difficulty) = {
            let session = self.session.borrow();
            let Some(session) = session.as_ref() else {
                return;
            };
            (Rc::clone(&session.field), session.difficulty)
        };
        let routine = match difficulty {
            Difficulty::Easy => GhostRoutine::Free,
            Difficulty::Normal => {
                self.scheduler
                    .schedule(self.config.switch_period, EventId::SwitchTimeout);
                GhostRoutine::Scatter
            }
            Difficulty::Hard => GhostRoutine::Chase,
        };

        let anchors = field.grid().anchors();
        let player_position = Vec2::new(
            Fixed64::from_num(anchors.player.x + 1),
            Fixed64::from_num(anchors.player.y) + Fixed64::from_num(0.5),
        );
        let pen = anchors.pen;
        let pen_position = |dx: f64, dy: f64| {
            Vec2::new(
                Fixed64::from_num(pen.x) + Fixed64::from_num(dx),
                Fixed64::from_num(pen.y) + Fixed64::from_num(dy),
            )
        };

        field.spawn_player(
            player_position,
            Direction::West,
            (PlayerLife::None, PlayerMotion::Walking),
        );
        field.spawn_ghost(
            ActorTag::RedGhost,
            pen_position(4.0, -0.5),
            Direction::West,
            (GhostAlert::None, routine, GhostPen::None),
        );
        field.spawn_ghost(
            ActorTag::PinkGhost,
            pen_position(4.0, 2.5),
            Direction::North,
            (GhostAlert::None, routine, GhostPen::Home),
        );
        field.spawn_ghost(
            ActorTag::BlueGhost,
            pen_position(2.0, 2.5),
            Direction::South,
            (GhostAlert::None, routine, GhostPen::Home),
        );
        field.spawn_ghost(
            ActorTag::OrangeGhost,
            pen_position(6.0, 2.5),
            Direction::South,
            (GhostAlert::None, routine, GhostPen::Home),
        );

        self.mode.set(GameMode::Wait);
        self.scheduler
            .schedule(self.config.start_delay, EventId::GameStart);
        self.scheduler
            .schedule(self.config.release_delays[0], EventId::PinkGhostOut);
        self.scheduler
            .schedule(self.config.release_delays[1], EventId::BlueGhostOut);
        self.scheduler
            .schedule(self.config.release_delays[2], EventId::OrangeGhostOut);
    }

    // -----------------------------------------------------------------------
    // Event handlers
    // -----------------------------------------------------------------------

    fn on_tick(&self, _args: &EventArgs) {
        match self.mode.get() {
            GameMode::Play => {
                let mut fire_next_level = false;
                {
                    let mut session = self.session.borrow_mut();
                    let Some(session) = session.as_mut() else {
                        return;
                    };
                    session.time += 1;
                    if session.dots == 0 {
                        self.mode.set(GameMode::Free);
                        session.level += 1;
                        if session.level > self.config.max_level {
                            self.mode.set(GameMode::Win);
                            info!(scores = session.scores, "game won");
                        } else {
                            info!(level = session.level, "level cleared");
                            fire_next_level = true;
                        }
                    } else {
                        let player_defeated = session
                            .field
                            .with_actor(ActorTag::Player, |a| {
                                a.player_mode().is_some_and(|m| m.0 == PlayerLife::Dead)
                            })
                            .unwrap_or(false);
                        if player_defeated {
                            self.mode.set(GameMode::Free);
                            session.lives -= 1;
                            if session.lives > 0 {
                                info!(lives = session.lives, "life lost");
                                self.scheduler
                                    .schedule(self.config.respawn_delay, EventId::GameRestart);
                            } else {
                                self.scheduler
                                    .schedule(self.config.end_delay, EventId::GameEnd);
                            }
                        }
                    }
                }
                if fire_next_level {
                    self.bus
                        .fire(EventId::NextLevel, EventArgs::empty(Sender::Driver));
                }
                if let Some(field) = self.field() {
                    field.update();
                }
            }
            GameMode::Free => {
                if let Some(field) = self.field() {
                    field.update();
                }
            }
            _ => {}
        }
        self.bus
            .fire(EventId::ModelUpdate, EventArgs::empty(Sender::Driver));
    }

    fn on_pickup(&self, args: &EventArgs) {
        let Payload::Pickup { pickup } = args.payload else {
            return;
        };
        let mut session = self.session.borrow_mut();
        let Some(session) = session.as_mut() else {
            return;
        };
        match pickup {
            Pickup::Energizer => {
                session.scores += 100;
                self.scheduler
                    .schedule(self.config.frightened_delay, EventId::FrightenedTimeout);
                self.scheduler
                    .schedule(self.config.energizer_delay, EventId::EnergizerTimeout);
            }
            Pickup::Dot => {
                session.scores += 10;
                session.dots = session.dots.saturating_sub(1);
            }
            Pickup::Fruit => {
                session.scores += 500;
            }
        }
        debug!(?pickup, scores = session.scores, "pickup");
    }

    /// Level cleared: rebuild the field from the pristine grid, then run
    /// the shared restart path.
    fn on_next_level(&self) {
        {
            let mut session = self.session.borrow_mut();
            let Some(session) = session.as_mut() else {
                return;
            };
            session.field.destroy_actors();
            session.field = Field::new(
                Rc::clone(&self.bus),
                session.grid_template.clone(),
                self.seed,
            );
            session.dots = session.grid_template.dot_count();
        }
        self.bus
            .fire(EventId::GameRestart, EventArgs::empty(Sender::Driver));
    }

    fn on_restart(&self) {
        self.scheduler.reset();
        if let Some(field) = self.field() {
            field.destroy_actors();
        }
        self.begin_round();
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Snapshot the running session. Only meaningful mid-play; any other
    /// mode returns `None`.
    pub fn save_game(&self) -> Option<SaveData> {
        if self.mode.get() != GameMode::Play {
            return None;
        }
        let session = self.session.borrow();
        let session = session.as_ref()?;
        let field = &session.field;
        let save = SaveData {
            info: InfoSection {
                date: chrono::Local::now().format("%d.%m.%Y %H:%M:%S").to_string(),
            },
            game: GameSection {
                time: session.time,
                grid: session.grid_name.clone(),
                difficulty: session.difficulty.name().to_owned(),
                level: session.level,
                scores: session.scores,
                lives: session.lives,
                dots: session.dots,
            },
            scheduler: self.scheduler.store(),
            blocks: save::blocks_section(&field.grid()),
            player: save::player_section(field),
            red_ghost: save::ghost_section(field, ActorTag::RedGhost),
            pink_ghost: save::ghost_section(field, ActorTag::PinkGhost),
            blue_ghost: save::ghost_section(field, ActorTag::BlueGhost),
            orange_ghost: save::ghost_section(field, ActorTag::OrangeGhost),
        };
        info!("game saved");
        Some(save)
    }

    /// Rebuild a session from a save. The caller resolves the grid named
    /// in `save.game.grid` and passes it in (grid files are outside this
    /// crate). All parsing happens before live state is touched; on any
    /// [`FormatError`] the driver ends up Idle and the caller decides
    /// whether to offer a fresh game instead.
    pub fn load_game(&self, save: &SaveData, grid: Grid) -> Result<(), FormatError> {
        let difficulty = Difficulty::from_name(&save.game.difficulty)?;
        let blocks = save::parse_blocks(&save.blocks)?;
        let player = save::parse_player(&save.player)?;
        let ghosts = [
            (ActorTag::RedGhost, save::parse_ghost(&save.red_ghost)?),
            (ActorTag::PinkGhost, save::parse_ghost(&save.pink_ghost)?),
            (ActorTag::BlueGhost, save::parse_ghost(&save.blue_ghost)?),
            (ActorTag::OrangeGhost, save::parse_ghost(&save.orange_ghost)?),
        ];

        self.reset();
        let field = Field::new(Rc::clone(&self.bus), grid.clone(), self.seed);
        *self.session.borrow_mut() = Some(Session {
            time: save.game.time,
            grid_name: save.game.grid.clone(),
            difficulty,
            level: save.game.level,
            scores: save.game.scores,
            lives: save.game.lives,
            dots: save.game.dots,
            grid_template: grid,
            field: Rc::clone(&field),
        });
        if let Err(error) = self.scheduler.load(&save.scheduler) {
            self.reset();
            return Err(error);
        }

        {
            let mut grid = field.grid_mut();
            for (cell, content) in blocks {
                grid.set_content(cell, content);
            }
        }

        field.spawn_player(player.position, player.direction, player.mode);
        let _ = field.with_actor_mut(ActorTag::Player, |actor| {
            if let Kind::Player(p) = &mut actor.kind {
                p.last_turn = player.last_turn;
            }
        });
        for (tag, ghost) in ghosts {
            field.spawn_ghost(tag, ghost.position, ghost.direction, ghost.mode);
            let _ = field.with_actor_mut(tag, |actor| {
                if let Kind::Ghost(g) = &mut actor.kind {
                    g.last_turn = ghost.last_turn;
                    g.last_node = ghost.last_node;
                }
            });
        }

        self.mode.set(GameMode::Wait);
        self.scheduler
            .schedule(self.config.start_delay, EventId::GameStart);
        info!(grid = save.game.grid.as_str(), "game loaded");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Ticker
// ---------------------------------------------------------------------------

/// A headless tick source: fires TICK with a monotonically increasing
/// time payload. The real-time pacing loop lives outside this crate;
/// tests and replay tooling drive this directly.
pub struct Ticker {
    count: Cell<Ticks>,
}

impl Ticker {
    pub fn new() -> Self {
        Self {
            count: Cell::new(0),
        }
    }

    /// The time the next tick will carry.
    pub fn time(&self) -> Ticks {
        self.count.get()
    }

    /// Fire one TICK.
    pub fn step(&self, bus: &EventBus) {
        let time = self.count.get();
        bus.fire(
            EventId::Tick,
            EventArgs::new(Sender::External, Payload::Tick { time }),
        );
        self.count.set(time + 1);
    }

    /// Fire `ticks` TICKs back to back.
    pub fn run(&self, bus: &EventBus, ticks: u64) {
        for _ in 0..ticks {
            self.step(bus);
        }
    }
}

impl Default for Ticker {
    fn default() -> Self {
        Self::new()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
