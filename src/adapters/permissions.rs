//! Desktop permission handling.
//!
//! Desktop platforms have no runtime permission dialog for the microphone;
//! access is granted iff an input device is visible to the process. A
//! request therefore resolves immediately through the registered callback.

use super::{PermissionAdapter, PermissionCallback, PermissionError, SetupError};
use crate::data::PermissionKind;

use cpal::traits::HostTrait;
use std::sync::Mutex;

#[derive(Default)]
pub struct DesktopPermissions {
    callback: Mutex<Option<PermissionCallback>>,
}

impl DesktopPermissions {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PermissionAdapter for DesktopPermissions {
    fn is_granted(&self, permission: PermissionKind) -> bool {
        match permission {
            PermissionKind::Microphone => {
                cpal::default_host().default_input_device().is_some()
            }
        }
    }

    fn register(&self, callback: PermissionCallback) -> Result<(), SetupError> {
        let mut slot = self.callback.lock().unwrap();
        if slot.is_some() {
            return Err(SetupError::AlreadyRegistered);
        }
        *slot = Some(callback);
        Ok(())
    }

    fn request(&self, permission: PermissionKind) -> Result<(), PermissionError> {
        let granted = self.is_granted(permission);
        let slot = self.callback.lock().unwrap();
        let callback = slot.as_ref().ok_or(PermissionError::NotRegistered)?;
        callback(permission, granted);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registering_twice_is_a_setup_error() {
        let adapter = DesktopPermissions::new();

        assert!(adapter.register(Box::new(|_, _| {})).is_ok());
        let second = adapter.register(Box::new(|_, _| {}));
        assert!(matches!(second, Err(SetupError::AlreadyRegistered)));
    }

    #[test]
    fn requesting_before_registration_is_an_error() {
        let adapter = DesktopPermissions::new();

        let result = adapter.request(PermissionKind::Microphone);
        assert!(matches!(result, Err(PermissionError::NotRegistered)));
    }
}
