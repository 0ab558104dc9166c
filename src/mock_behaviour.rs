//! This module provides ways to tweak in-memory collections and auth services, so that they can return errors in some tests

use crate::error::RemoteError;

/// This stores some behaviour tweaks, that describe how an in-memory instance will behave during a given test
///
/// So that a functions fails _n_ times after _m_ initial successes, set `(m, n)` for the suited parameter
#[derive(Default, Clone, Debug)]
pub struct MockBehaviour {
    /// If this is true, every action will be allowed
    pub is_suspended: bool,

    // From the RemoteCollection trait
    pub create_document_behaviour: (u32, u32),
    pub update_fields_behaviour: (u32, u32),
    pub delete_document_behaviour: (u32, u32),
    pub subscribe_behaviour: (u32, u32),

    // From the AuthService trait
    pub sign_in_behaviour: (u32, u32),
    pub sign_out_behaviour: (u32, u32),
}

impl MockBehaviour {
    pub fn new() -> Self {
        Self::default()
    }

    /// All actions will fail at once, for `n_fails` times
    pub fn fail_now(n_fails: u32) -> Self {
        Self {
            is_suspended: false,
            create_document_behaviour: (0, n_fails),
            update_fields_behaviour: (0, n_fails),
            delete_document_behaviour: (0, n_fails),
            subscribe_behaviour: (0, n_fails),
            sign_in_behaviour: (0, n_fails),
            sign_out_behaviour: (0, n_fails),
        }
    }

    /// Suspend this mock behaviour until you call `resume`
    pub fn suspend(&mut self) {
        self.is_suspended = true;
    }
    /// Make this behaviour active again
    pub fn resume(&mut self) {
        self.is_suspended = false;
    }

    pub fn can_create_document(&mut self) -> Result<(), RemoteError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.create_document_behaviour, "create_document")
    }
    pub fn can_update_fields(&mut self) -> Result<(), RemoteError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.update_fields_behaviour, "update_fields")
    }
    pub fn can_delete_document(&mut self) -> Result<(), RemoteError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.delete_document_behaviour, "delete_document")
    }
    pub fn can_subscribe(&mut self) -> Result<(), RemoteError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.subscribe_behaviour, "subscribe")
    }
    pub fn can_sign_in(&mut self) -> Result<(), RemoteError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.sign_in_behaviour, "sign_in")
    }
    pub fn can_sign_out(&mut self) -> Result<(), RemoteError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.sign_out_behaviour, "sign_out")
    }
}


/// Return Ok(()) in case the value is `(1+, _)` or `(_, 0)`, or return Err and decrement otherwise
fn decrement(value: &mut (u32, u32), descr: &str) -> Result<(), RemoteError> {
    let remaining_successes = value.0;
    let remaining_failures = value.1;

    if remaining_successes > 0 {
        value.0 -= 1;
        log::debug!("Mock behaviour: allowing a {} ({:?})", descr, value);
        Ok(())
    } else if remaining_failures > 0 {
        value.1 -= 1;
        log::debug!("Mock behaviour: failing a {} ({:?})", descr, value);
        Err(RemoteError::new(format!("Mocked behaviour requires this {} to fail this time. ({:?})", descr, value)))
    } else {
        log::debug!("Mock behaviour: allowing a {} ({:?})", descr, value);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_mock_behaviour() {
        let mut ok = MockBehaviour::new();
        assert!(ok.can_create_document().is_ok());
        assert!(ok.can_create_document().is_ok());
        assert!(ok.can_subscribe().is_ok());

        let mut now = MockBehaviour::fail_now(2);
        assert!(now.can_create_document().is_err());
        assert!(now.can_delete_document().is_err());
        assert!(now.can_delete_document().is_err());
        assert!(now.can_create_document().is_err());
        assert!(now.can_create_document().is_ok());
        assert!(now.can_create_document().is_ok());
        assert!(now.can_delete_document().is_ok());

        let mut custom = MockBehaviour{
            create_document_behaviour: (0,1),
            update_fields_behaviour: (1,3),
            ..MockBehaviour::default()
        };
        assert!(custom.can_create_document().is_err());
        assert!(custom.can_create_document().is_ok());
        assert!(custom.can_create_document().is_ok());
        assert!(custom.can_update_fields().is_ok());
        assert!(custom.can_update_fields().is_err());
        assert!(custom.can_update_fields().is_err());
        assert!(custom.can_update_fields().is_err());
        assert!(custom.can_update_fields().is_ok());

        let mut suspended = MockBehaviour::fail_now(1);
        suspended.suspend();
        assert!(suspended.can_sign_in().is_ok());
        suspended.resume();
        assert!(suspended.can_sign_in().is_err());
        assert!(suspended.can_sign_in().is_ok());
    }
}
