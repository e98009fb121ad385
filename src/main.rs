//! Plinko Replay entry point
//!
//! In the browser: canvas, animation-frame loop and DOM controls. Natively:
//! the headless operator CLI.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_game {
    use std::cell::RefCell;
    use std::rc::Rc;

    use rand::SeedableRng;
    use rand_pcg::Pcg32;
    use wasm_bindgen::prelude::*;
    use web_sys::{HtmlCanvasElement, HtmlInputElement, HtmlSelectElement};

    use plinko_replay::audio::{AudioManager, SoundEffect};
    use plinko_replay::consts::*;
    use plinko_replay::paths::{PathLibrary, ProbabilityTable};
    use plinko_replay::payout::{Balance, Risk, Wallet};
    use plinko_replay::persistence::{BlobStore, LocalStorageBlobStore};
    use plinko_replay::recorder::{RecorderConfig, VisualRecorder, record_until_filled};
    use plinko_replay::renderer::{RenderState, board_vertices, recorder_vertices};
    use plinko_replay::settings::Settings;
    use plinko_replay::sim::{BoardMode, PlinkoBoard, RowCount, TickInput, tick};

    /// Starting play balance
    const START_BALANCE: u64 = 1000;
    /// Longest frame gap fed to the timers (tab switches)
    const MAX_FRAME_MS: f64 = 100.0;

    /// Game instance holding all state
    struct Game {
        plinko: PlinkoBoard,
        library: Rc<RefCell<PathLibrary>>,
        settings: Settings,
        wallet: Balance,
        recorder: Option<VisualRecorder>,
        recorder_rng: Pcg32,
        audio: AudioManager,
        render_state: Option<RenderState>,
        last_time: f64,
        drop_requested: bool,
    }

    impl Game {
        fn new(seed: u64) -> Self {
            let settings = Settings::load();
            let store: Rc<dyn BlobStore> = Rc::new(LocalStorageBlobStore::new("plinko_"));
            let library = Rc::new(RefCell::new(PathLibrary::new(
                store.clone(),
                settings.paths_per_bucket,
            )));
            let mut probabilities = ProbabilityTable::new(store);
            probabilities.load();
            let plinko = PlinkoBoard::from_settings(
                &settings,
                library.clone(),
                Rc::new(RefCell::new(probabilities)),
                seed,
            );
            let mut audio = AudioManager::new();
            audio.set_muted(settings.muted);

            Self {
                plinko,
                library,
                settings,
                wallet: Balance::new(START_BALANCE),
                recorder: None,
                recorder_rng: Pcg32::seed_from_u64(seed ^ 0x5eed),
                audio,
                render_state: None,
                last_time: 0.0,
                drop_requested: false,
            }
        }

        /// Advance one display frame
        fn update(&mut self, dt_ms: f64) {
            let dt_ms = dt_ms.min(MAX_FRAME_MS);

            if let Some(recorder) = self.recorder.as_mut() {
                let frame = recorder.frame(dt_ms, &mut self.recorder_rng);
                if frame.dropped {
                    self.audio.play(SoundEffect::Drop);
                }
                if !frame.peg_hits.is_empty() {
                    self.audio.play(SoundEffect::PegHit);
                }
                if recorder.is_finished() {
                    self.finish_recording();
                }
                self.drop_requested = false;
                return;
            }

            let input = TickInput {
                dt_ms,
                drop: std::mem::take(&mut self.drop_requested),
            };
            let report = tick(&mut self.plinko, &input, &mut self.wallet);

            if !report.dropped.is_empty() {
                self.audio.play(SoundEffect::Drop);
            }
            if !report.peg_hits.is_empty() {
                self.audio.play(SoundEffect::PegHit);
            }
            for settlement in &report.settlements {
                self.audio.play(SoundEffect::Bucket(settlement.bucket));
            }
            for error in &report.drop_errors {
                log::info!("Drop refused: {}", error);
            }
            if report.mode_changed.is_some() {
                self.audio.play(SoundEffect::RecordingDone);
            }
        }

        fn render(&mut self) {
            let vertices = match &self.recorder {
                Some(recorder) => recorder_vertices(recorder),
                None => board_vertices(&self.plinko),
            };
            if let Some(render_state) = self.render_state.as_mut() {
                match render_state.render(&vertices) {
                    Ok(_) => {}
                    Err(wgpu::SurfaceError::Lost) => {
                        render_state.resize(render_state.size.0, render_state.size.1);
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("Out of memory!");
                    }
                    Err(e) => log::warn!("Render error: {:?}", e),
                }
            }
        }

        /// Update HUD elements in DOM
        fn update_hud(&self) {
            let Some(document) = web_sys::window().and_then(|w| w.document()) else {
                return;
            };
            let set = |id: &str, text: &str| {
                if let Some(el) = document.get_element_by_id(id) {
                    el.set_text_content(Some(text));
                }
            };

            set("hud-balance", &self.wallet.balance().to_string());
            set("hud-in-flight", &self.plinko.balls_in_flight().to_string());
            let rows = self.plinko.rows();
            match &self.recorder {
                Some(recorder) => {
                    set("hud-mode", "Recording (visual)");
                    set("hud-progress", &recorder.progress());
                }
                None => {
                    set(
                        "hud-mode",
                        match self.plinko.mode() {
                            BoardMode::Recording => "Recording",
                            BoardMode::Playback => "Playback",
                        },
                    );
                    set("hud-progress", "");
                }
            }
            set("hud-library", &self.library.borrow().status_line(rows));
        }

        fn finish_recording(&mut self) {
            let Some(recorder) = self.recorder.take() else {
                return;
            };
            let report = recorder.commit(&mut self.library.borrow_mut());
            log::info!(
                "Visual recording stored {} paths in {} attempts",
                report.accepted,
                report.attempts
            );
            self.plinko.refresh_mode();
            self.audio.play(SoundEffect::RecordingDone);
        }

        fn record_fast(&mut self) {
            let rows = self.plinko.rows();
            let report = record_until_filled(
                &mut self.library.borrow_mut(),
                rows,
                self.settings.paths_per_bucket,
                &RecorderConfig::default(),
                &mut self.recorder_rng,
            );
            if !report.is_complete() {
                log::warn!("Fast recording left buckets {:?} unfilled", report.unfilled);
            }
            self.plinko.refresh_mode();
            self.audio.play(SoundEffect::RecordingDone);
        }

        fn start_visual_recording(&mut self) {
            if self.recorder.is_some() {
                return;
            }
            // The board stops ticking while the recorder owns the frame
            if !self.plinko.is_idle() {
                log::info!(
                    "Visual recording waits for {} balls in flight",
                    self.plinko.balls_in_flight()
                );
                return;
            }
            let recorder = VisualRecorder::new(
                &self.library.borrow(),
                self.plinko.rows(),
                self.settings.paths_per_bucket,
                self.settings.balls_per_second,
                RecorderConfig::default(),
            );
            self.recorder = Some(recorder);
        }

        fn cancel_visual_recording(&mut self) {
            if let Some(recorder) = self.recorder.as_mut() {
                recorder.cancel();
            }
            self.finish_recording();
        }
    }

    fn window_document() -> Option<(web_sys::Window, web_sys::Document)> {
        let window = web_sys::window()?;
        let document = window.document()?;
        Some((window, document))
    }

    /// Current value of an `<input>` or `<select>`
    fn control_value(el: &web_sys::Element) -> Option<String> {
        if let Some(input) = el.dyn_ref::<HtmlInputElement>() {
            return Some(input.value());
        }
        el.dyn_ref::<HtmlSelectElement>().map(|s| s.value())
    }

    fn control_checked(el: &web_sys::Element) -> bool {
        el.dyn_ref::<HtmlInputElement>().is_some_and(|i| i.checked())
    }

    /// Attach `handler` to `event` on the element with `id`, if present
    fn on(
        game: &Rc<RefCell<Game>>,
        id: &str,
        event: &str,
        mut handler: impl FnMut(&mut Game, &web_sys::Element) + 'static,
    ) {
        let Some((_, document)) = window_document() else {
            return;
        };
        let Some(el) = document.get_element_by_id(id) else {
            log::debug!("No #{} control on the page", id);
            return;
        };
        let game = game.clone();
        let target = el.clone();
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
            let mut g = game.borrow_mut();
            g.audio.resume();
            handler(&mut *g, &target);
        });
        let _ = el.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn setup_controls(canvas: &HtmlCanvasElement, game: &Rc<RefCell<Game>>) {
        // Click on the board drops a ball
        {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::MouseEvent| {
                let mut g = game.borrow_mut();
                g.audio.resume();
                g.drop_requested = true;
            });
            let _ = canvas
                .add_event_listener_with_callback("mousedown", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Keyboard
        if let Some((window, _)) = window_document() {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: web_sys::KeyboardEvent| {
                if event.key() == " " {
                    event.prevent_default();
                    game.borrow_mut().drop_requested = true;
                }
            });
            let _ = window
                .add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        on(game, "drop-btn", "click", |g, _| g.drop_requested = true);

        on(game, "rows", "change", |g, el| {
            let Some(rows) = control_value(el).and_then(|v| v.parse::<u32>().ok()) else {
                return;
            };
            let Some(row_count) = RowCount::from_rows(rows) else {
                log::warn!("Unsupported row count {}", rows);
                return;
            };
            match g.plinko.set_rows(row_count) {
                Ok(()) => {
                    let _ = g.settings.set_rows(rows);
                    g.settings.save();
                }
                Err(e) => log::warn!("Row change refused: {}", e),
            }
        });

        on(game, "risk", "change", |g, el| {
            if let Some(risk) = control_value(el).as_deref().and_then(Risk::parse) {
                g.plinko.risk = risk;
                g.settings.risk = risk;
                g.settings.save();
            }
        });

        on(game, "bet", "change", |g, el| {
            if let Some(bet) = control_value(el).and_then(|v| v.trim().parse::<u64>().ok()) {
                g.plinko.bet = bet;
                g.settings.bet = bet;
                g.settings.save();
            }
        });

        on(game, "manual-bucket", "change", |g, el| {
            let bucket = control_value(el).and_then(|v| v.parse::<usize>().ok());
            match g.plinko.set_manual_bucket(bucket) {
                Ok(()) => {
                    g.settings.manual_bucket = bucket;
                    g.settings.save();
                }
                Err(e) => log::warn!("{}", e),
            }
        });

        on(game, "auto-drop", "change", |g, el| {
            let enabled = control_checked(el);
            g.plinko.auto_drop.enabled = enabled;
            g.plinko.auto_drop.remaining = g.settings.auto_drop_balls;
            g.settings.auto_drop = enabled;
            g.settings.save();
        });

        on(game, "mute", "change", |g, el| {
            let muted = control_checked(el);
            g.audio.set_muted(muted);
            g.settings.muted = muted;
            g.settings.save();
        });

        on(game, "balls-per-second", "input", |g, el| {
            if let Some(bps) = control_value(el).and_then(|v| v.parse::<u32>().ok()) {
                g.settings.set_balls_per_second(bps);
                let bps = g.settings.balls_per_second;
                if let Some(recorder) = g.recorder.as_mut() {
                    recorder.set_balls_per_second(bps);
                }
                g.settings.save();
            }
        });

        on(game, "reset-paths", "click", |g, _| {
            if g.recorder.is_none() {
                g.plinko.reset_paths();
            }
        });
        on(game, "record-fast", "click", |g, _| {
            if g.recorder.is_none() {
                g.record_fast();
            }
        });
        on(game, "record-visual", "click", |g, _| g.start_visual_recording());
        on(game, "record-cancel", "click", |g, _| g.cancel_visual_recording());
    }

    /// Reflect loaded settings in the form controls
    fn sync_controls(settings: &Settings) {
        let Some((_, document)) = window_document() else {
            return;
        };
        let set_value = |id: &str, value: &str| {
            let Some(el) = document.get_element_by_id(id) else {
                return;
            };
            if let Some(input) = el.dyn_ref::<HtmlInputElement>() {
                input.set_value(value);
            } else if let Some(select) = el.dyn_ref::<HtmlSelectElement>() {
                select.set_value(value);
            }
        };
        set_value("rows", &settings.rows.to_string());
        set_value("risk", settings.risk.as_str());
        set_value("bet", &settings.bet.to_string());
        set_value(
            "manual-bucket",
            &settings.manual_bucket.map(|b| b.to_string()).unwrap_or_default(),
        );
        set_value("balls-per-second", &settings.balls_per_second.to_string());
        for (id, checked) in [("auto-drop", settings.auto_drop), ("mute", settings.muted)] {
            if let Some(input) = document
                .get_element_by_id(id)
                .and_then(|el| el.dyn_into::<HtmlInputElement>().ok())
            {
                input.set_checked(checked);
            }
        }
    }

    pub async fn run() {
        console_error_panic_hook::set_once();
        if console_log::init_with_level(log::Level::Info).is_err() {
            web_sys::console::warn_1(&"Logger already initialised".into());
        }

        log::info!("Plinko Replay starting...");

        let Some((window, document)) = window_document() else {
            log::error!("No window or document");
            return;
        };

        // Hide loading indicator
        if let Some(loading) = document.get_element_by_id("loading") {
            let _ = loading.set_attribute("class", "hidden");
        }

        let Some(canvas) = document
            .get_element_by_id("canvas")
            .and_then(|el| el.dyn_into::<HtmlCanvasElement>().ok())
        else {
            log::error!("No #canvas element");
            return;
        };

        // Set canvas size
        let dpr = window.device_pixel_ratio();
        let width = (canvas.client_width() as f64 * dpr) as u32;
        let height = (canvas.client_height() as f64 * dpr) as u32;
        canvas.set_width(width);
        canvas.set_height(height);

        let seed = js_sys::Date::now() as u64;
        let game = Rc::new(RefCell::new(Game::new(seed)));
        sync_controls(&game.borrow().settings);
        log::info!("Board initialized with seed: {}", seed);

        // Initialize WebGPU
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::BROWSER_WEBGPU | wgpu::Backends::GL,
            ..Default::default()
        });

        match instance.create_surface(wgpu::SurfaceTarget::Canvas(canvas.clone())) {
            Ok(surface) => {
                let adapter = instance
                    .request_adapter(&wgpu::RequestAdapterOptions {
                        power_preference: wgpu::PowerPreference::HighPerformance,
                        compatible_surface: Some(&surface),
                        force_fallback_adapter: false,
                    })
                    .await;
                match adapter {
                    Ok(adapter) => {
                        log::info!("Using adapter: {:?}", adapter.get_info().name);
                        match RenderState::new(surface, &adapter, width, height).await {
                            Ok(render_state) => game.borrow_mut().render_state = Some(render_state),
                            Err(e) => log::error!("Renderer unavailable: {}", e),
                        }
                    }
                    Err(e) => log::error!("No graphics adapter: {}", e),
                }
            }
            Err(e) => log::error!("Failed to create surface: {}", e),
        }

        setup_controls(&canvas, &game);

        // Start game loop
        request_animation_frame(game);

        log::info!("Plinko Replay running!");
    }

    fn request_animation_frame(game: Rc<RefCell<Game>>) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let closure = Closure::once(move |time: f64| {
            game_loop(game, time);
        });
        let _ = window.request_animation_frame(closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn game_loop(game: Rc<RefCell<Game>>, time: f64) {
        {
            let mut g = game.borrow_mut();

            let dt_ms = if g.last_time > 0.0 {
                time - g.last_time
            } else {
                (SIM_DT * 1000.0) as f64
            };
            g.last_time = time;

            g.update(dt_ms);
            g.render();
            g.update_hud();
        }

        request_animation_frame(game);
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub async fn wasm_main() {
    wasm_game::run().await;
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    if let Err(error) = plinko_replay::cli::run_from_env() {
        eprintln!("{error}");
        std::process::exit(error.exit_code());
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}
