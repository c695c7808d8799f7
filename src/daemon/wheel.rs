//! Click-wheel gesture decoding.
//!
//! Raw pointer samples over the annular wheel surface (and raw key codes)
//! are turned into discrete [`Intent`]s here. The decoder owns all transient
//! touch state; nothing else in the daemon inspects pointer positions.

use crate::config::WheelConfig;
use serde::{Deserialize, Serialize};

/// Where a pointer sample sits in the press/release cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Down,
    Move,
    Up,
}

/// One raw pointer event, in the same coordinate space as the wheel layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerSample {
    pub x: f32,
    pub y: f32,
    pub phase: Phase,
}

/// The four physical buttons on the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WheelButton {
    Menu,
    PlayPause,
    Forward,
    Backward,
}

/// A decoded, device-independent user action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    ScrollUp,
    ScrollDown,
    Select,
    Button(WheelButton),
    NavigateUp,
    NavigateDown,
    NavigateLeft,
    NavigateRight,
    GoBack,
    TogglePlayback,
    Quit,
}

/// A key press as delivered by the frontend. `Char` carries anything that is
/// not one of the dedicated control keys, so modal text entry sees the raw
/// character before any intent mapping happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    Up,
    Down,
    Left,
    Right,
    Enter,
    Escape,
    Backspace,
    Char(char),
}

/// An angular sector of the ring. `start > end` wraps through 0/360.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleRange {
    pub start: f32,
    pub end: f32,
}

impl AngleRange {
    pub fn contains(&self, angle: f32) -> bool {
        if self.start <= self.end {
            self.start <= angle && angle <= self.end
        } else {
            angle >= self.start || angle <= self.end
        }
    }
}

/// Hit-test geometry of the wheel, fixed at construction.
#[derive(Debug, Clone)]
pub struct WheelLayout {
    center_x: f32,
    center_y: f32,
    center_radius: f32,
    outer_radius: f32,
    scroll_threshold: f32,
    quadrants: Vec<(AngleRange, WheelButton)>,
}

impl From<&WheelConfig> for WheelLayout {
    fn from(config: &WheelConfig) -> Self {
        WheelLayout {
            center_x: config.center_x,
            center_y: config.center_y,
            center_radius: config.center_radius,
            outer_radius: config.outer_radius,
            scroll_threshold: config.scroll_threshold_deg,
            quadrants: config
                .quadrants
                .iter()
                .map(|q| {
                    (
                        AngleRange {
                            start: q.start_deg,
                            end: q.end_deg,
                        },
                        q.button,
                    )
                })
                .collect(),
        }
    }
}

impl WheelLayout {
    fn quadrant_at(&self, angle: f32) -> Option<WheelButton> {
        self.quadrants
            .iter()
            .find(|(range, _)| range.contains(angle))
            .map(|(_, button)| *button)
    }
}

/// Gesture decoder for the wheel. Mutated only through its own methods; the
/// pressed region is latched on Down and stays fixed for that press.
#[derive(Debug)]
pub struct Wheel {
    layout: WheelLayout,
    touching_ring: bool,
    last_angle: f32,
    scroll_accum: f32,
    pressed_region: Option<WheelButton>,
    center_pressed: bool,
}

impl Wheel {
    pub fn new(layout: WheelLayout) -> Self {
        Wheel {
            layout,
            touching_ring: false,
            last_angle: 0.0,
            scroll_accum: 0.0,
            pressed_region: None,
            center_pressed: false,
        }
    }

    /// Clears all transient touch state. Call when the owning UI abandons
    /// the input context (menu changed externally, focus lost).
    pub fn reset(&mut self) {
        self.touching_ring = false;
        self.scroll_accum = 0.0;
        self.pressed_region = None;
        self.center_pressed = false;
    }

    /// Decodes one pointer sample. A single fast drag can drain the scroll
    /// accumulator several times, so more than one intent per call is normal.
    pub fn decode_pointer(&mut self, sample: PointerSample) -> Vec<Intent> {
        let mut intents = Vec::new();
        let dx = sample.x - self.layout.center_x;
        let dy = sample.y - self.layout.center_y;
        let distance = dx.hypot(dy);

        if distance <= self.layout.center_radius {
            self.on_center(sample.phase, &mut intents);
        } else if distance <= self.layout.outer_radius {
            self.on_ring(sample.phase, angle_of(dx, dy), &mut intents);
        } else {
            // Outside the wheel: abandon any in-progress touch, emit nothing.
            self.reset();
        }

        intents
    }

    fn on_center(&mut self, phase: Phase, intents: &mut Vec<Intent>) {
        if self.touching_ring {
            // The press started on the ring; a release over the center ends
            // it without triggering anything.
            if phase == Phase::Up {
                self.touching_ring = false;
                self.pressed_region = None;
                self.scroll_accum = 0.0;
            }
            return;
        }
        match phase {
            Phase::Down if !self.center_pressed => {
                // Select fires on press, not release, to feel responsive.
                intents.push(Intent::Select);
                self.center_pressed = true;
            }
            Phase::Up => {
                self.center_pressed = false;
            }
            _ => {}
        }
    }

    fn on_ring(&mut self, phase: Phase, angle: f32, intents: &mut Vec<Intent>) {
        // While the center button is held, the ring is inert for this press.
        if self.center_pressed {
            if phase == Phase::Up {
                self.center_pressed = false;
            }
            return;
        }

        match phase {
            Phase::Down => {
                self.touching_ring = true;
                self.last_angle = angle;
                self.pressed_region = self.layout.quadrant_at(angle);
                self.scroll_accum = 0.0;
            }
            Phase::Move if self.touching_ring => {
                self.scroll_accum += signed_delta(self.last_angle, angle);
                while self.scroll_accum.abs() >= self.layout.scroll_threshold {
                    if self.scroll_accum > 0.0 {
                        intents.push(Intent::ScrollDown);
                        self.scroll_accum -= self.layout.scroll_threshold;
                    } else {
                        intents.push(Intent::ScrollUp);
                        self.scroll_accum += self.layout.scroll_threshold;
                    }
                }
                self.last_angle = angle;
                // Once the finger moves, this press can no longer be a
                // button tap.
                self.pressed_region = None;
            }
            Phase::Up if self.touching_ring => {
                // Only a clean press-and-release within the same quadrant
                // counts as a button tap; a swipe passing through a zone
                // must not trigger it.
                if let Some(pressed) = self.pressed_region {
                    if self.layout.quadrant_at(angle) == Some(pressed) {
                        intents.push(Intent::Button(pressed));
                    }
                }
                self.touching_ring = false;
                self.pressed_region = None;
                self.scroll_accum = 0.0;
            }
            _ => {}
        }
    }
}

/// Maps a key press to intents. Stateless; arrow keys and WASD bypass all
/// angle math, and four dedicated keys hit the quadrant buttons directly.
pub fn decode_key(key: KeyInput) -> Vec<Intent> {
    let intent = match key {
        KeyInput::Up | KeyInput::Char('w') => Intent::NavigateUp,
        KeyInput::Down | KeyInput::Char('s') => Intent::NavigateDown,
        KeyInput::Left | KeyInput::Char('a') => Intent::NavigateLeft,
        KeyInput::Right | KeyInput::Char('d') => Intent::NavigateRight,
        KeyInput::Enter | KeyInput::Char(' ') => Intent::Select,
        KeyInput::Escape | KeyInput::Backspace => Intent::GoBack,
        KeyInput::Char('p') => Intent::TogglePlayback,
        KeyInput::Char('m') => Intent::Button(WheelButton::Menu),
        KeyInput::Char('k') => Intent::Button(WheelButton::PlayPause),
        KeyInput::Char('l') => Intent::Button(WheelButton::Forward),
        KeyInput::Char('j') => Intent::Button(WheelButton::Backward),
        KeyInput::Char('q') => Intent::Quit,
        KeyInput::Char(_) => return Vec::new(),
    };
    vec![intent]
}

/// atan2 normalized to `[0, 360)` degrees.
fn angle_of(dx: f32, dy: f32) -> f32 {
    let mut angle = dy.atan2(dx).to_degrees();
    if angle < 0.0 {
        angle += 360.0;
    }
    angle
}

/// Signed angular difference normalized into `(-180, 180]`, so a drag across
/// the 0/360 seam accumulates correctly.
fn signed_delta(from: f32, to: f32) -> f32 {
    let mut delta = to - from;
    if delta > 180.0 {
        delta -= 360.0;
    } else if delta < -180.0 {
        delta += 360.0;
    }
    delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WheelConfig;

    fn wheel() -> Wheel {
        Wheel::new(WheelLayout::from(&WheelConfig::default()))
    }

    /// Point on the ring at `angle` degrees, relative to the default layout.
    fn ring_point(angle_deg: f32) -> (f32, f32) {
        let config = WheelConfig::default();
        let r = (config.center_radius + config.outer_radius) / 2.0;
        let rad = angle_deg.to_radians();
        (
            config.center_x + r * rad.cos(),
            config.center_y + r * rad.sin(),
        )
    }

    fn sample(angle_deg: f32, phase: Phase) -> PointerSample {
        let (x, y) = ring_point(angle_deg);
        PointerSample { x, y, phase }
    }

    #[test]
    fn angle_range_plain_and_wraparound() {
        let plain = AngleRange {
            start: 60.0,
            end: 120.0,
        };
        assert!(plain.contains(60.0));
        assert!(plain.contains(90.0));
        assert!(plain.contains(120.0));
        assert!(!plain.contains(59.0));
        assert!(!plain.contains(121.0));

        let wrapped = AngleRange {
            start: 340.0,
            end: 20.0,
        };
        assert!(wrapped.contains(340.0));
        assert!(wrapped.contains(359.9));
        assert!(wrapped.contains(0.0));
        assert!(wrapped.contains(20.0));
        assert!(!wrapped.contains(200.0));
        assert!(!wrapped.contains(21.0));
    }

    #[test]
    fn default_quadrants_never_overlap() {
        let layout = WheelLayout::from(&WheelConfig::default());
        for tenth in 0..3600 {
            let angle = tenth as f32 / 10.0;
            let hits = layout
                .quadrants
                .iter()
                .filter(|(range, _)| range.contains(angle))
                .count();
            assert!(hits <= 1, "angle {angle} is in {hits} quadrants");
        }
    }

    #[test]
    fn center_press_selects_on_down_only() {
        let config = WheelConfig::default();
        let mut wheel = wheel();
        let down = PointerSample {
            x: config.center_x,
            y: config.center_y,
            phase: Phase::Down,
        };
        let up = PointerSample {
            phase: Phase::Up,
            ..down
        };
        assert_eq!(wheel.decode_pointer(down), vec![Intent::Select]);
        // Held down: no repeats.
        assert!(
            wheel
                .decode_pointer(PointerSample {
                    phase: Phase::Down,
                    ..down
                })
                .is_empty()
        );
        assert!(wheel.decode_pointer(up).is_empty());
    }

    #[test]
    fn drag_of_three_thresholds_emits_three_scrolls() {
        let mut wheel = wheel();
        assert!(wheel.decode_pointer(sample(90.0, Phase::Down)).is_empty());
        // Just past 3 x 15 degrees clockwise; the half-degree margin keeps
        // atan2 rounding away from the drain boundary.
        let intents = wheel.decode_pointer(sample(135.5, Phase::Move));
        assert_eq!(
            intents,
            vec![Intent::ScrollDown, Intent::ScrollDown, Intent::ScrollDown]
        );
        assert!(wheel.scroll_accum.abs() < 15.0);
        // Releasing after a scroll is not a button tap.
        assert!(wheel.decode_pointer(sample(135.5, Phase::Up)).is_empty());
    }

    #[test]
    fn counter_clockwise_drag_scrolls_up() {
        let mut wheel = wheel();
        wheel.decode_pointer(sample(135.0, Phase::Down));
        let intents = wheel.decode_pointer(sample(104.5, Phase::Move));
        assert_eq!(intents, vec![Intent::ScrollUp, Intent::ScrollUp]);
        assert!(wheel.scroll_accum.abs() < 15.0);
    }

    #[test]
    fn drag_across_the_zero_seam_accumulates_once() {
        let mut wheel = wheel();
        wheel.decode_pointer(sample(350.0, Phase::Down));
        // 350 -> 25.5 is +35.5 degrees, not -324.5.
        let intents = wheel.decode_pointer(sample(25.5, Phase::Move));
        assert_eq!(intents, vec![Intent::ScrollDown, Intent::ScrollDown]);
    }

    #[test]
    fn partial_drag_keeps_residue_below_threshold() {
        let mut wheel = wheel();
        wheel.decode_pointer(sample(90.0, Phase::Down));
        assert!(wheel.decode_pointer(sample(104.0, Phase::Move)).is_empty());
        assert!(wheel.scroll_accum.abs() < 15.0);
        let intents = wheel.decode_pointer(sample(106.5, Phase::Move));
        assert_eq!(intents, vec![Intent::ScrollDown]);
        assert!(wheel.scroll_accum.abs() < 15.0);
    }

    #[test]
    fn release_in_pressed_quadrant_triggers_its_button() {
        let mut wheel = wheel();
        // 10 degrees is inside the wraparound Forward sector (340..20).
        wheel.decode_pointer(sample(10.0, Phase::Down));
        let intents = wheel.decode_pointer(sample(15.0, Phase::Up));
        assert_eq!(intents, vec![Intent::Button(WheelButton::Forward)]);
    }

    #[test]
    fn release_in_another_quadrant_triggers_nothing() {
        let mut wheel = wheel();
        wheel.decode_pointer(sample(10.0, Phase::Down));
        assert!(wheel.decode_pointer(sample(200.0, Phase::Up)).is_empty());
        assert!(!wheel.touching_ring);
    }

    #[test]
    fn swipe_through_a_button_zone_does_not_press_it() {
        let mut wheel = wheel();
        wheel.decode_pointer(sample(350.0, Phase::Down));
        wheel.decode_pointer(sample(30.0, Phase::Move));
        // Back into the Forward sector, but the press became a scroll.
        assert!(wheel.decode_pointer(sample(10.0, Phase::Up)).is_empty());
    }

    #[test]
    fn leaving_the_wheel_resets_touch_state() {
        let mut wheel = wheel();
        wheel.decode_pointer(sample(90.0, Phase::Down));
        assert!(wheel.touching_ring);
        let outside = PointerSample {
            x: 0.0,
            y: 0.0,
            phase: Phase::Move,
        };
        assert!(wheel.decode_pointer(outside).is_empty());
        assert!(!wheel.touching_ring);
        assert_eq!(wheel.scroll_accum, 0.0);
    }

    #[test]
    fn key_mapping_covers_the_intent_vocabulary() {
        assert_eq!(decode_key(KeyInput::Up), vec![Intent::NavigateUp]);
        assert_eq!(decode_key(KeyInput::Char('s')), vec![Intent::NavigateDown]);
        assert_eq!(decode_key(KeyInput::Enter), vec![Intent::Select]);
        assert_eq!(decode_key(KeyInput::Escape), vec![Intent::GoBack]);
        assert_eq!(
            decode_key(KeyInput::Char('p')),
            vec![Intent::TogglePlayback]
        );
        assert_eq!(
            decode_key(KeyInput::Char('m')),
            vec![Intent::Button(WheelButton::Menu)]
        );
        assert_eq!(
            decode_key(KeyInput::Char('l')),
            vec![Intent::Button(WheelButton::Forward)]
        );
        assert_eq!(decode_key(KeyInput::Char('q')), vec![Intent::Quit]);
        assert!(decode_key(KeyInput::Char('z')).is_empty());
    }
}
