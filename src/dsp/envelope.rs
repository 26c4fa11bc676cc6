use crate::MIN_PERIOD;

/*
Exponential ADR Envelope
========================

This envelope drives analog VCA/VCF control inputs, so it models the classic
one-pole analog contour rather than a linear ramp: every tick the level moves
a fixed *fraction* of the remaining distance toward the stage target.

  level' = level + (target - level) * clamp(lambda * dt, 0, 1)

`lambda` is chosen so the stage parameter (attack/decay/release, in seconds)
is the ~95% settling time:

  lambda = -ln(EPS) / period        with EPS = 0.05

The clamp re-linearizes the exponential per tick, which keeps the update
stable for arbitrarily large `dt` (a stalled control loop can never overshoot
the target, it just lands on it).

Stages are Attack, Decay and Release only - "sustain" is simply Decay having
converged onto the sustain level. A gate edge switches the stage: rising
edges restart Attack from the current level (no click, no level reset),
falling edges enter Release from wherever the contour happens to be. Attack
hands over to Decay once the level is within EPS of full scale.
*/

const EPS: f32 = 0.05;
/// `-ln(EPS)`, so the stage time parameter is the ~95% settling time.
const MINUS_LN_EPS: f32 = 2.9957;

/// The current stage of the envelope state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    Attack,
    Decay,
    Release,
}

#[derive(Debug, Clone)]
pub struct Envelope {
    // Contour parameters, refreshed from the patch before every update
    pub attack: f32,  // seconds to ~95% of full scale
    pub decay: f32,   // seconds to ~95% of the way down to sustain
    pub sustain: f32, // level to converge on while the gate is held (0.0 - 1.0)
    pub release: f32, // seconds to ~95% of the way back to zero

    level: f32,
    stage: EnvelopeStage,
    last_gate: bool,
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new()
    }
}

impl Envelope {
    pub fn new() -> Self {
        Self {
            attack: 0.0,
            decay: 0.0,
            sustain: 1.0,
            release: 0.0,
            level: 0.0,
            stage: EnvelopeStage::Release,
            last_gate: false,
        }
    }

    /// Advance the envelope by `dt` seconds. Called once per control tick.
    pub fn update(&mut self, dt: f32, gate: bool) {
        if self.last_gate != gate {
            self.last_gate = gate;
            self.stage = if gate {
                EnvelopeStage::Attack
            } else {
                EnvelopeStage::Release
            };
        }

        let (target, period) = match self.stage {
            EnvelopeStage::Attack => (1.0, self.attack),
            EnvelopeStage::Decay => (self.sustain, self.decay),
            EnvelopeStage::Release => (0.0, self.release),
        };

        let lambda = MINUS_LN_EPS / period.max(MIN_PERIOD);
        let delta = target - self.level;

        self.level += delta * (lambda * dt).clamp(0.0, 1.0);

        if self.stage == EnvelopeStage::Attack && delta.abs() < EPS {
            self.stage = EnvelopeStage::Decay;
        }
    }

    /// Silence the envelope and rearm the attack stage.
    ///
    /// Used when a gated voice gets stolen: restarting the attack from zero
    /// keeps the stolen note from clicking or double-triggering decay.
    pub fn hard_retrigger(&mut self) {
        self.level = 0.0;
        self.stage = EnvelopeStage::Attack;
    }

    /// Current output level (0.0 to 1.0).
    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }
}
