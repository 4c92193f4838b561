pub mod clock;
pub mod spawn;

pub use clock::{Clock, MonotonicClock};
pub use spawn::{Job, Spawner, ThreadHandle, ThreadSpawner, WorkerHandle};

/// Noisy scalar sensor (capacitive pad, ADC channel, ...).
pub trait Sensor {
    fn read(&mut self) -> Result<i32, Box<dyn std::error::Error + Send + Sync>>;
}

/// Digital on/off output driving the pump.
pub trait Actuator {
    fn enable(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn disable(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

impl<S: Sensor + ?Sized> Sensor for Box<S> {
    fn read(&mut self) -> Result<i32, Box<dyn std::error::Error + Send + Sync>> {
        (**self).read()
    }
}

impl<A: Actuator + ?Sized> Actuator for Box<A> {
    fn enable(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).enable()
    }
    fn disable(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).disable()
    }
}
