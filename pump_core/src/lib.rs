#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Pulse-monitored dosing pump engine (hardware-agnostic).
//!
//! The pump is a simple on/off device whose mechanical cycles show up as
//! oscillations on a noisy sensor. Volume is dispensed by counting those
//! cycles: every local maximum and minimum is one pulse. All hardware goes
//! through `pump_traits::Actuator` and `pump_traits::Sensor`.
//!
//! ## Architecture
//!
//! - **RingBuffer**: fixed-capacity window storage (`ring_buffer`)
//! - **Detection**: centered-lookahead peak/trough detector (`detector`)
//! - **Control**: blocking run loop with baseline recalibration (`control`)
//! - **Background**: worker lifecycle, cooperative and forced stop (`task`)
//! - **Diagnostics**: pulse timing and amplitude statistics (`diagnostics`)
//!
//! Both pump flavours implement the `Pump` trait and are built with
//! `PumpBuilder`.

pub mod builder;
pub mod config;
pub mod control;
pub mod conversions;
pub mod detector;
pub mod diagnostics;
pub mod error;
pub mod mocks;
pub mod pump;
pub mod ring_buffer;
pub mod task;
pub mod util;

pub use builder::{BackgroundPump, BlockingPump, Missing, PumpBuilder, Set};
pub use config::{PumpCfg, SafetyCfg, SamplingCfg, StopCfg};
pub use control::{DosingControlLoop, MIN_PULSES_PER_REQUEST, pulses_for_volume};
pub use detector::{ExtremumDetector, Polarity};
pub use diagnostics::{Diagnostics, DiagnosticsSummary};
pub use error::{AbortReason, BuildError, IndexOutOfRange, PumpError};
pub use pump::Pump;
pub use ring_buffer::RingBuffer;
pub use task::{AsyncDosingTask, StopOutcome, TaskState};
