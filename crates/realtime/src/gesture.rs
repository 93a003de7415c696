use std::fmt;

use crate::{config::GestureConfig, queue::Outcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
	Down,
	Move,
	Up,
	Leave,
}

/// Device-independent pointer input. Touch and mouse events are both reduced to this.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerSample {
	pub x: f64,
	pub y: f64,
	pub phase: PointerPhase,
}

impl PointerSample {
	#[must_use]
	pub const fn new(x: f64, y: f64, phase: PointerPhase) -> Self {
		Self { x, y, phase }
	}

	#[must_use]
	pub const fn from_mouse(kind: MouseKind, client_x: f64, client_y: f64) -> Self {
		let phase = match kind {
			MouseKind::Down => PointerPhase::Down,
			MouseKind::Move => PointerPhase::Move,
			MouseKind::Up => PointerPhase::Up,
			MouseKind::Leave => PointerPhase::Leave,
		};

		Self::new(client_x, client_y, phase)
	}

	/// Only the first touch point drives the card. Start and move events without any touch point are
	/// ignored; end events carry no position, releases resolve from the last move anyway.
	#[must_use]
	pub fn from_touch(kind: TouchKind, touches: &[TouchPoint]) -> Option<Self> {
		let first = touches.first().copied();

		match kind {
			TouchKind::Start => {
				first.map(|t| Self::new(t.client_x, t.client_y, PointerPhase::Down))
			}
			TouchKind::Move => first.map(|t| Self::new(t.client_x, t.client_y, PointerPhase::Move)),
			TouchKind::End => Some(Self::new(0.0, 0.0, PointerPhase::Up)),
			TouchKind::Cancel => Some(Self::new(0.0, 0.0, PointerPhase::Leave)),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseKind {
	Down,
	Move,
	Up,
	Leave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchKind {
	Start,
	Move,
	End,
	Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchPoint {
	pub client_x: f64,
	pub client_y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
	Like,
	Pass,
	/// Released before the commit threshold, the card snaps back.
	Cancel,
}

impl Decision {
	#[must_use]
	pub const fn outcome(self) -> Option<Outcome> {
		match self {
			Self::Like => Some(Outcome::Like),
			Self::Pass => Some(Outcome::Pass),
			Self::Cancel => None,
		}
	}
}

/// Transform, opacity and direction hint of the card being dragged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CardVisual {
	pub dx: f64,
	pub dy: f64,
	pub rotation_deg: f64,
	pub opacity: f64,
	/// Advisory only, lit once the preview threshold is crossed.
	pub direction: Option<Outcome>,
}

impl CardVisual {
	pub const IDENTITY: Self = Self {
		dx: 0.0,
		dy: 0.0,
		rotation_deg: 0.0,
		opacity: 1.0,
		direction: None,
	};

	#[must_use]
	pub fn is_identity(&self) -> bool {
		*self == Self::IDENTITY
	}
}

impl Default for CardVisual {
	fn default() -> Self {
		Self::IDENTITY
	}
}

impl fmt::Display for CardVisual {
	/// CSS transform of the card.
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.is_identity() {
			return Ok(());
		}

		write!(
			f,
			"translate({}px, {}px) rotate({}deg)",
			self.dx, self.dy, self.rotation_deg
		)
	}
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum GestureState {
	Idle,
	Dragging {
		start: (f64, f64),
		current: (f64, f64),
	},
}

/// Turns a stream of pointer samples into Like/Pass/Cancel decisions.
#[derive(Debug, Clone)]
pub struct GestureEngine {
	config: GestureConfig,
	state: GestureState,
	visual: CardVisual,
}

impl GestureEngine {
	#[must_use]
	pub const fn new(config: GestureConfig) -> Self {
		Self {
			config,
			state: GestureState::Idle,
			visual: CardVisual::IDENTITY,
		}
	}

	/// Feeds one sample. A decision is returned only when a drag ends.
	pub fn handle(&mut self, sample: PointerSample) -> Option<Decision> {
		match (sample.phase, self.state) {
			(PointerPhase::Down, _) => {
				self.state = GestureState::Dragging {
					start: (sample.x, sample.y),
					current: (sample.x, sample.y),
				};
				self.visual = CardVisual::IDENTITY;
				None
			}

			(PointerPhase::Move, GestureState::Dragging { start, .. }) => {
				let current = (sample.x, sample.y);
				self.state = GestureState::Dragging { start, current };
				self.visual = self.visual_for(current.0 - start.0, current.1 - start.1);
				None
			}

			(PointerPhase::Up | PointerPhase::Leave, GestureState::Dragging { start, current }) => {
				self.state = GestureState::Idle;
				self.visual = CardVisual::IDENTITY;
				Some(self.resolve(current.0 - start.0))
			}

			(_, GestureState::Idle) => None,
		}
	}

	fn visual_for(&self, dx: f64, dy: f64) -> CardVisual {
		let distance = dx.abs();

		CardVisual {
			dx,
			dy,
			rotation_deg: dx * self.config.rotation_coefficient,
			opacity: (1.0 - distance / self.config.opacity_falloff).max(self.config.min_opacity),
			direction: (distance > self.config.preview_threshold).then(|| direction_of(dx)),
		}
	}

	fn resolve(&self, dx: f64) -> Decision {
		if dx.abs() > self.config.commit_threshold {
			match direction_of(dx) {
				Outcome::Like => Decision::Like,
				Outcome::Pass => Decision::Pass,
			}
		} else {
			Decision::Cancel
		}
	}

	#[must_use]
	pub const fn visual(&self) -> CardVisual {
		self.visual
	}

	#[must_use]
	pub const fn is_dragging(&self) -> bool {
		matches!(self.state, GestureState::Dragging { .. })
	}
}

fn direction_of(dx: f64) -> Outcome {
	if dx > 0.0 {
		Outcome::Like
	} else {
		Outcome::Pass
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn drag(engine: &mut GestureEngine, dx: f64) -> Option<Decision> {
		engine.handle(PointerSample::new(200.0, 300.0, PointerPhase::Down));
		engine.handle(PointerSample::new(200.0 + dx, 310.0, PointerPhase::Move));
		engine.handle(PointerSample::new(0.0, 0.0, PointerPhase::Up))
	}

	#[test]
	fn just_under_commit_threshold_snaps_back() {
		let mut engine = GestureEngine::new(GestureConfig::default());

		assert_eq!(drag(&mut engine, 99.0), Some(Decision::Cancel));
		assert!(engine.visual().is_identity());
		assert_eq!(engine.visual().opacity, 1.0);
		assert_eq!(engine.visual().to_string(), "");

		assert_eq!(drag(&mut engine, -99.0), Some(Decision::Cancel));
		assert!(!engine.is_dragging());
	}

	#[test]
	fn past_commit_threshold_decides_by_direction() {
		let mut engine = GestureEngine::new(GestureConfig::default());

		assert_eq!(drag(&mut engine, 101.0), Some(Decision::Like));
		assert!(engine.visual().is_identity());
		assert_eq!(drag(&mut engine, -101.0), Some(Decision::Pass));
		assert_eq!(Decision::Pass.outcome(), Some(Outcome::Pass));
		assert_eq!(Decision::Cancel.outcome(), None);
	}

	#[test]
	fn exactly_at_threshold_is_not_a_commit() {
		let mut engine = GestureEngine::new(GestureConfig::default());
		assert_eq!(drag(&mut engine, 100.0), Some(Decision::Cancel));
	}

	#[test]
	fn visuals_follow_the_drag() {
		let mut engine = GestureEngine::new(GestureConfig::default());

		engine.handle(PointerSample::new(10.0, 10.0, PointerPhase::Down));
		engine.handle(PointerSample::new(40.0, 20.0, PointerPhase::Move));

		let visual = engine.visual();
		assert_eq!(visual.dx, 30.0);
		assert_eq!(visual.dy, 10.0);
		assert!((visual.rotation_deg - 3.0).abs() < 1e-9);
		assert!((visual.opacity - 0.9).abs() < 1e-9);
		assert_eq!(visual.direction, None);

		engine.handle(PointerSample::new(-50.0, 20.0, PointerPhase::Move));
		assert_eq!(engine.visual().direction, Some(Outcome::Pass));

		engine.handle(PointerSample::new(1_000.0, 20.0, PointerPhase::Move));
		assert_eq!(engine.visual().direction, Some(Outcome::Like));
		assert!((engine.visual().opacity - 0.3).abs() < 1e-9);
		assert_eq!(
			engine.visual().to_string(),
			"translate(990px, 10px) rotate(99deg)"
		);
	}

	#[test]
	fn motion_without_press_is_ignored() {
		let mut engine = GestureEngine::new(GestureConfig::default());

		assert_eq!(
			engine.handle(PointerSample::new(500.0, 0.0, PointerPhase::Move)),
			None
		);
		assert_eq!(
			engine.handle(PointerSample::new(500.0, 0.0, PointerPhase::Up)),
			None
		);
		assert!(engine.visual().is_identity());
	}

	#[test]
	fn release_without_motion_cancels() {
		let mut engine = GestureEngine::new(GestureConfig::default());

		engine.handle(PointerSample::new(0.0, 0.0, PointerPhase::Down));
		engine.handle(PointerSample::new(500.0, 0.0, PointerPhase::Move));
		engine.handle(PointerSample::new(0.0, 0.0, PointerPhase::Leave));

		// A fresh press must not inherit the previous gesture's position
		engine.handle(PointerSample::new(10.0, 0.0, PointerPhase::Down));
		assert_eq!(
			engine.handle(PointerSample::new(999.0, 0.0, PointerPhase::Up)),
			Some(Decision::Cancel)
		);
	}

	#[test]
	fn touch_and_mouse_drive_the_same_gesture() {
		let touch = |x: f64| {
			[TouchPoint {
				client_x: x,
				client_y: 0.0,
			}]
		};

		let mut by_touch = GestureEngine::new(GestureConfig::default());
		for sample in [
			PointerSample::from_touch(TouchKind::Start, &touch(10.0)),
			PointerSample::from_touch(TouchKind::Move, &touch(150.0)),
			PointerSample::from_touch(TouchKind::Move, &[]),
		]
		.into_iter()
		.flatten()
		{
			assert_eq!(by_touch.handle(sample), None);
		}
		let touch_visual = by_touch.visual();
		let touch_decision = PointerSample::from_touch(TouchKind::End, &[])
			.and_then(|sample| by_touch.handle(sample));

		let mut by_mouse = GestureEngine::new(GestureConfig::default());
		by_mouse.handle(PointerSample::from_mouse(MouseKind::Down, 10.0, 0.0));
		by_mouse.handle(PointerSample::from_mouse(MouseKind::Move, 150.0, 0.0));
		let mouse_visual = by_mouse.visual();
		let mouse_decision = by_mouse.handle(PointerSample::from_mouse(MouseKind::Up, 0.0, 0.0));

		assert_eq!(touch_visual, mouse_visual);
		assert_eq!(touch_decision, Some(Decision::Like));
		assert_eq!(mouse_decision, Some(Decision::Like));
	}
}
