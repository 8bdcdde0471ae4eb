//! Interrupt controller
//!
//! One pending flag per source. Arbitration happens at instruction boundaries:
//! with EA set and no handler in service, the highest-priority source that is
//! both pending and enabled in IE is taken and its pending flag cleared.
//! Further interrupts are held off until `RETI`.

/// IE bit 7: global enable
pub const IE_EA: u8 = 0x80;

/// Interrupt sources in fixed priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterruptSource {
    /// External interrupt 0
    External0,
    /// Timer 0 overflow
    Timer0,
    /// External interrupt 1
    External1,
    /// Timer 1 overflow
    Timer1,
    /// Serial port (RI/TI)
    Serial,
}

impl InterruptSource {
    /// All sources, highest priority first
    pub const PRIORITY: [InterruptSource; 5] = [
        InterruptSource::External0,
        InterruptSource::Timer0,
        InterruptSource::External1,
        InterruptSource::Timer1,
        InterruptSource::Serial,
    ];

    /// Fixed entry address
    pub fn vector(self) -> u16 {
        match self {
            InterruptSource::External0 => 0x0003,
            InterruptSource::Timer0 => 0x000B,
            InterruptSource::External1 => 0x0013,
            InterruptSource::Timer1 => 0x001B,
            InterruptSource::Serial => 0x0023,
        }
    }

    /// Individual enable bit in IE (also used as the pending bit)
    pub fn enable_mask(self) -> u8 {
        match self {
            InterruptSource::External0 => 0x01,
            InterruptSource::Timer0 => 0x02,
            InterruptSource::External1 => 0x04,
            InterruptSource::Timer1 => 0x08,
            InterruptSource::Serial => 0x10,
        }
    }
}

/// Pending/in-service tracking
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterruptController {
    pending: u8,
    in_service: Option<InterruptSource>,
}

impl InterruptController {
    /// Controller with nothing pending
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `source` pending
    pub fn raise(&mut self, source: InterruptSource) {
        self.pending |= source.enable_mask();
    }

    /// Withdraw a pending request
    pub fn clear(&mut self, source: InterruptSource) {
        self.pending &= !source.enable_mask();
    }

    /// Whether `source` is pending
    pub fn is_pending(&self, source: InterruptSource) -> bool {
        self.pending & source.enable_mask() != 0
    }

    /// Handler currently running, if any
    pub fn in_service(&self) -> Option<InterruptSource> {
        self.in_service
    }

    /// Arbitrate against the IE register. The returned source is taken:
    /// its pending flag is cleared and it is marked in service.
    pub fn next(&mut self, ie: u8) -> Option<InterruptSource> {
        if ie & IE_EA == 0 || self.in_service.is_some() {
            return None;
        }
        let source = InterruptSource::PRIORITY
            .into_iter()
            .find(|s| self.pending & ie & s.enable_mask() != 0)?;
        self.clear(source);
        self.in_service = Some(source);
        Some(source)
    }

    /// `RETI` executed
    pub fn end_service(&mut self) {
        self.in_service = None;
    }

    /// Drop all pending and in-service state
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ES: u8 = 0x10;

    #[test]
    fn test_serial_requires_global_and_individual_enable() {
        let mut ic = InterruptController::new();
        ic.raise(InterruptSource::Serial);

        assert_eq!(ic.next(ES), None);
        assert_eq!(ic.next(IE_EA), None);
        assert!(ic.is_pending(InterruptSource::Serial));

        assert_eq!(ic.next(IE_EA | ES), Some(InterruptSource::Serial));
        assert!(!ic.is_pending(InterruptSource::Serial));
    }

    #[test]
    fn test_priority_order() {
        let mut ic = InterruptController::new();
        ic.raise(InterruptSource::Serial);
        ic.raise(InterruptSource::Timer1);
        ic.raise(InterruptSource::External0);

        assert_eq!(ic.next(0xFF), Some(InterruptSource::External0));
        ic.end_service();
        assert_eq!(ic.next(0xFF), Some(InterruptSource::Timer1));
        ic.end_service();
        assert_eq!(ic.next(0xFF), Some(InterruptSource::Serial));
    }

    #[test]
    fn test_no_nesting_until_reti() {
        let mut ic = InterruptController::new();
        ic.raise(InterruptSource::Serial);
        assert!(ic.next(0xFF).is_some());

        ic.raise(InterruptSource::Serial);
        assert_eq!(ic.next(0xFF), None);
        ic.end_service();
        assert_eq!(ic.next(0xFF), Some(InterruptSource::Serial));
    }

    #[test]
    fn test_vectors() {
        assert_eq!(InterruptSource::External0.vector(), 0x0003);
        assert_eq!(InterruptSource::Serial.vector(), 0x0023);
    }
}
