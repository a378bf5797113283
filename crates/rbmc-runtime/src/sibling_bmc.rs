//! [`SiblingBmc`] – the peer as seen through its mailbox.
//!
//! The peer's mailbox device only appears once the FSI link trains, which may
//! be long after this daemon starts.  Until then every poll re-checks for the
//! device and counts as a failed read.

use rbmc_hal::MailboxAccess;
use rbmc_wire::{HeartbeatMonitor, PollOutcome, SiblingMailbox, SiblingRegisters};
use tracing::{debug, info};

pub struct SiblingBmc {
    mailbox: SiblingMailbox,
    attached: bool,
    monitor: HeartbeatMonitor,
}

impl SiblingBmc {
    /// `allowed_misses` bad polls in a row are tolerated before the sibling
    /// is declared unreachable.
    pub fn new(access: MailboxAccess, allowed_misses: u32) -> Self {
        Self {
            mailbox: SiblingMailbox::new(access),
            attached: false,
            monitor: HeartbeatMonitor::new(allowed_misses),
        }
    }

    /// Read the sibling's mailbox once and update the liveness verdict.
    pub fn poll(&mut self) -> PollOutcome {
        let heartbeat = if self.attach() {
            // read_all logs its own failures.
            self.mailbox
                .read_all()
                .and_then(|()| self.mailbox.heartbeat())
                .ok()
        } else {
            debug!("sibling mailbox not present yet");
            None
        };

        let outcome = self.monitor.observe(heartbeat);
        debug!(
            ?outcome,
            ?heartbeat,
            alive = self.monitor.is_alive(),
            misses = self.monitor.consecutive_misses(),
            "sibling polled"
        );
        outcome
    }

    fn attach(&mut self) -> bool {
        if !self.attached && self.mailbox.exists() {
            info!("sibling mailbox found");
            self.attached = true;
        }
        self.attached
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Current liveness verdict.
    pub fn is_alive(&self) -> bool {
        self.monitor.is_alive()
    }

    pub fn consecutive_misses(&self) -> u32 {
        self.monitor.consecutive_misses()
    }

    /// Registers from the most recent poll, if it succeeded.
    pub fn registers(&self) -> Option<SiblingRegisters> {
        self.mailbox.registers().ok().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rbmc_hal::paths::create_fake_link;
    use rbmc_hal::{DevicePaths, SimDriver};
    use rbmc_wire::RegisterImage;
    use std::sync::Arc;

    fn reg0(heartbeat: u8) -> u32 {
        RegisterImage {
            heartbeat,
            ..RegisterImage::default()
        }
        .to_reg0()
    }

    #[test]
    fn attaches_once_device_appears() {
        let root = tempfile::tempdir().expect("tmp dir");
        let paths = DevicePaths::new(root.path().join("fsi-master"), root.path().join("dev"));
        let sim = Arc::new(SimDriver::new());
        let mut sibling = SiblingBmc::new(MailboxAccess::new(1, paths.clone(), sim.clone()), 0);

        assert_eq!(sibling.poll(), PollOutcome::ReadFailed);
        assert!(!sibling.is_attached());
        assert!(sibling.registers().is_none());
        assert!(sim.calls().is_empty());

        let device = create_fake_link(&paths, 1).expect("fake link");
        sim.add_device(&device, [reg0(3), 0xCAFE, 0, 0]);

        assert_eq!(sibling.poll(), PollOutcome::FirstSample);
        assert!(sibling.is_attached());
        assert_eq!(sibling.registers().map(|r| r.fw_version), Some(0xCAFE));
        assert!(!sibling.is_alive());

        sim.set_register(&device, 0, reg0(4));
        assert_eq!(sibling.poll(), PollOutcome::Advanced);
        assert!(sibling.is_alive());
    }

    #[test]
    fn stalled_heartbeat_marks_sibling_down() {
        let sim = Arc::new(SimDriver::new());
        let device = std::path::PathBuf::from("/dev/mbox-cfam-s11");
        sim.add_device(&device, [reg0(10), 0, 0, 0]);
        let mut sibling = SiblingBmc::new(MailboxAccess::with_device(&device, sim.clone()), 0);

        sibling.poll();
        sim.set_register(&device, 0, reg0(11));
        sibling.poll();
        assert!(sibling.is_alive());

        assert_eq!(sibling.poll(), PollOutcome::Stalled);
        assert!(!sibling.is_alive());
        assert_eq!(sibling.consecutive_misses(), 1);
    }

    #[test]
    fn failed_read_drops_registers() {
        let sim = Arc::new(SimDriver::new());
        let device = std::path::PathBuf::from("/dev/mbox-cfam-s11");
        sim.add_device(&device, [reg0(1), 0, 0, 0]);
        let mut sibling = SiblingBmc::new(MailboxAccess::with_device(&device, sim.clone()), 0);

        sibling.poll();
        assert!(sibling.registers().is_some());

        sim.remove_device(&device);
        assert_eq!(sibling.poll(), PollOutcome::ReadFailed);
        assert!(sibling.registers().is_none());
        assert!(!sibling.is_alive());
    }
}
