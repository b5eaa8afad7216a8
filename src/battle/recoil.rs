//! Recoil motor and limit switch.
//!
//! Airsoft and mechanical recoil units both run a motor until a limit switch signals the end of
//! the cycle. The switch interrupt shares state with the main loop through a critical section and
//! hands completed cycles over through a lock-free queue, the same way commands get from an
//! interrupt handler into the event loop.

use core::cell::RefCell;

use critical_section::Mutex;
use embedded_hal::digital::v2::{InputPin, OutputPin};
use heapless::mpmc::Q8;

/// Recoil motor state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecoilMotorState {
    Idle,
    /// Motor on, waiting for the limit switch
    Running,
    /// Switch seen, motor still on so the shot clears the barrel
    Completing,
}

/// Limit switch edge that ends a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    /// Mechanical recoil: barrel back home, motor stops right away
    Rising,
    /// Airsoft: shot released, motor stops after a short delay
    Falling,
}

/// Completed cycle reported by the limit switch interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RecoilEvent {
    pub edge: Edge,
    /// The cannon effects wait on this edge
    pub cannon_sequence: bool,
}

/// What the battle logic needs from a recoil unit.
pub trait RecoilActuator {
    /// Starts the motor and arms the limit switch for `edge`.
    fn start(&self, edge: Edge, cannon_sequence: bool);

    /// Stops the motor and disarms the switch. Does nothing when already stopped.
    fn force_stop(&self);

    /// Next cycle completed by the limit switch interrupt.
    fn take_event(&self) -> Option<RecoilEvent>;

    fn state(&self) -> RecoilMotorState;
}

struct Inner<M, S> {
    motor: Option<M>,
    switch: Option<S>,
    state: RecoilMotorState,
    armed: Option<(Edge, bool)>,
}

/// Recoil motor output plus limit switch input.
///
/// Meant to live in a `static` so the pin interrupt can reach it:
///
/// ``` no-test
/// static RECOIL: RecoilMechanism<MotorPin, SwitchPin> = RecoilMechanism::new();
///
/// #[interrupt]
/// fn IO_IRQ_BANK0() {
///     RECOIL.on_limit_switch_interrupt();
/// }
/// ```
pub struct RecoilMechanism<M, S> {
    inner: Mutex<RefCell<Inner<M, S>>>,
    events: Q8<RecoilEvent>,
}

impl<M: OutputPin, S: InputPin> RecoilMechanism<M, S> {
    pub const fn new() -> Self {
        RecoilMechanism {
            inner: Mutex::new(RefCell::new(Inner {
                motor: None,
                switch: None,
                state: RecoilMotorState::Idle,
                armed: None,
            })),
            events: Q8::new(),
        }
    }

    /// Hands the pins over. The motor is switched off.
    pub fn install(&self, mut motor: M, switch: S) {
        motor.set_low().ok();
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            inner.motor = Some(motor);
            inner.switch = Some(switch);
            inner.state = RecoilMotorState::Idle;
            inner.armed = None;
        });
    }

    /// True while the switch interrupt has work to do. Firmware may mask the pin interrupt
    /// otherwise.
    pub fn is_armed(&self) -> bool {
        critical_section::with(|cs| self.inner.borrow_ref(cs).armed.is_some())
    }

    /// Limit switch pin interrupt handler.
    ///
    /// The pin is sampled again to reject bounce: if the level already went back, the edge is
    /// ignored. A confirmed edge disarms the switch before anything else.
    pub fn on_limit_switch_interrupt(&self) {
        let event = critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            let (edge, cannon_sequence) = inner.armed?;

            let high = inner.switch.as_ref()?.is_high().ok()?;
            if high != (edge == Edge::Rising) {
                return None;
            }

            inner.armed = None;
            match edge {
                Edge::Rising => {
                    if let Some(motor) = inner.motor.as_mut() {
                        motor.set_low().ok();
                    }
                    inner.state = RecoilMotorState::Idle;
                }
                Edge::Falling => inner.state = RecoilMotorState::Completing,
            }

            Some(RecoilEvent {
                edge,
                cannon_sequence,
            })
        });

        if let Some(event) = event {
            // Only one cycle runs at a time, the queue cannot fill up
            self.events.enqueue(event).ok();
        }
    }
}

impl<M: OutputPin, S: InputPin> RecoilActuator for RecoilMechanism<M, S> {
    fn start(&self, edge: Edge, cannon_sequence: bool) {
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            let Some(motor) = inner.motor.as_mut() else {
                return;
            };
            motor.set_high().ok();
            inner.state = RecoilMotorState::Running;
            inner.armed = Some((edge, cannon_sequence));
        });
    }

    fn force_stop(&self) {
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            if let Some(motor) = inner.motor.as_mut() {
                motor.set_low().ok();
            }
            inner.state = RecoilMotorState::Idle;
            inner.armed = None;
        });
    }

    fn take_event(&self) -> Option<RecoilEvent> {
        self.events.dequeue()
    }

    fn state(&self) -> RecoilMotorState {
        critical_section::with(|cs| self.inner.borrow_ref(cs).state)
    }
}

impl<M: OutputPin, S: InputPin> Default for RecoilMechanism<M, S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use core::convert::Infallible;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Pin level shared between the test and the mechanism
    #[derive(Clone, Default)]
    pub(crate) struct Level(pub Rc<Cell<bool>>);

    impl Level {
        pub fn set(&self, high: bool) {
            self.0.set(high)
        }

        pub fn get(&self) -> bool {
            self.0.get()
        }
    }

    impl OutputPin for Level {
        type Error = Infallible;

        fn set_low(&mut self) -> Result<(), Infallible> {
            self.0.set(false);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.0.set(true);
            Ok(())
        }
    }

    impl InputPin for Level {
        type Error = Infallible;

        fn is_high(&self) -> Result<bool, Infallible> {
            Ok(self.0.get())
        }

        fn is_low(&self) -> Result<bool, Infallible> {
            Ok(!self.0.get())
        }
    }

    pub(crate) fn mechanism(switch_high: bool) -> (RecoilMechanism<Level, Level>, Level, Level) {
        let motor = Level::default();
        let switch = Level::default();
        switch.set(switch_high);
        let recoil = RecoilMechanism::new();
        recoil.install(motor.clone(), switch.clone());
        (recoil, motor, switch)
    }

    #[test]
    fn mechanical_edge_stops_motor_in_interrupt() {
        let (recoil, motor, switch) = mechanism(false);
        recoil.start(Edge::Rising, false);
        assert!(motor.get());
        assert_eq!(recoil.state(), RecoilMotorState::Running);

        switch.set(true);
        recoil.on_limit_switch_interrupt();
        assert!(!motor.get());
        assert_eq!(recoil.state(), RecoilMotorState::Idle);
        assert!(!recoil.is_armed());
        assert_eq!(
            recoil.take_event(),
            Some(RecoilEvent {
                edge: Edge::Rising,
                cannon_sequence: false
            })
        );
        assert_eq!(recoil.take_event(), None);
    }

    #[test]
    fn airsoft_edge_keeps_motor_running() {
        let (recoil, motor, switch) = mechanism(true);
        recoil.start(Edge::Falling, true);

        switch.set(false);
        recoil.on_limit_switch_interrupt();
        assert!(motor.get());
        assert_eq!(recoil.state(), RecoilMotorState::Completing);
        assert!(recoil.take_event().is_some_and(|e| e.cannon_sequence));

        recoil.force_stop();
        assert!(!motor.get());
    }

    #[test]
    fn bounce_is_ignored() {
        let (recoil, motor, _switch) = mechanism(true);
        recoil.start(Edge::Falling, true);

        // Level already back high when the handler samples it
        recoil.on_limit_switch_interrupt();
        assert!(motor.get());
        assert!(recoil.is_armed());
        assert_eq!(recoil.take_event(), None);
    }

    #[test]
    fn disarmed_switch_reports_nothing() {
        let (recoil, _motor, switch) = mechanism(false);
        switch.set(true);
        recoil.on_limit_switch_interrupt();
        assert_eq!(recoil.take_event(), None);
    }

    #[test]
    fn force_stop_is_idempotent() {
        let (recoil, motor, _switch) = mechanism(false);
        recoil.start(Edge::Rising, false);
        recoil.force_stop();
        recoil.force_stop();
        assert!(!motor.get());
        assert!(!recoil.is_armed());
        assert_eq!(recoil.state(), RecoilMotorState::Idle);
    }
}
