use crate::adapters::{PermissionAdapter, SetupError};
use crate::data::PermissionKind;
use crate::messages::{Message, PermissionMessage};
use crate::switchboard::{Dispatcher, EffectRouter, State};

use std::sync::Arc;

const KNOWN_PERMISSIONS: [PermissionKind; 1] = [PermissionKind::Microphone];

/// Bridges the permission message category to the permission adapter.
///
/// The result callback is installed at construction, before any request can
/// possibly be dispatched; a registration failure is fatal to startup.
pub struct PermissionRouter {
    adapter: Arc<dyn PermissionAdapter>,
}

impl PermissionRouter {
    pub fn new(
        adapter: Arc<dyn PermissionAdapter>,
        dispatcher: Dispatcher,
    ) -> Result<Self, SetupError> {
        adapter.register(Box::new(move |permission, granted| {
            dispatcher.dispatch(Message::Permissions(PermissionMessage::Updated {
                permission,
                granted,
            }));
        }))?;

        Ok(Self { adapter })
    }
}

impl EffectRouter for PermissionRouter {
    fn can_handle(&self, message: &Message) -> bool {
        matches!(message, Message::Permissions(_))
    }

    fn handle(&mut self, _state: &State, message: &Message, dispatcher: &Dispatcher) {
        let Message::Permissions(msg) = message else {
            return;
        };

        match msg {
            PermissionMessage::Initialize => {
                for permission in KNOWN_PERMISSIONS {
                    if self.adapter.is_granted(permission) {
                        dispatcher.dispatch(Message::Permissions(PermissionMessage::Updated {
                            permission,
                            granted: true,
                        }));
                    }
                }
            }
            PermissionMessage::Request(permission) => {
                if let Err(e) = self.adapter.request(*permission) {
                    tracing::error!("Permission request for {permission:?} failed: {e}");
                }
            }
            PermissionMessage::Updated { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{PermissionCallback, PermissionError};
    use crate::messages::Output;
    use crate::switchboard::{Switchboard, SwitchboardHandle};

    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::broadcast;

    struct MockPermissions {
        granted: bool,
        callback: Mutex<Option<PermissionCallback>>,
    }

    impl MockPermissions {
        fn new(granted: bool) -> Self {
            Self {
                granted,
                callback: Mutex::new(None),
            }
        }
    }

    impl PermissionAdapter for MockPermissions {
        fn is_granted(&self, _permission: PermissionKind) -> bool {
            self.granted
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
            let slot = self.callback.lock().unwrap();
            let callback = slot.as_ref().ok_or(PermissionError::NotRegistered)?;
            callback(permission, self.granted);
            Ok(())
        }
    }

    fn spawn_with_permissions(adapter: Arc<MockPermissions>) -> SwitchboardHandle {
        let mut switchboard = Switchboard::new();
        let router = PermissionRouter::new(adapter, switchboard.dispatcher()).unwrap();
        switchboard.add_router(Box::new(router));
        let handle = switchboard.handle();
        tokio::spawn(switchboard.run());
        handle
    }

    async fn next_permission_output(
        outputs: &mut broadcast::Receiver<Output>,
    ) -> crate::data::PermissionState {
        loop {
            let output = tokio::time::timeout(Duration::from_secs(1), outputs.recv())
                .await
                .expect("output in time")
                .expect("output channel open");
            if let Output::PermissionsUpdated(state) = output {
                return state;
            }
        }
    }

    #[tokio::test]
    async fn initialize_seeds_already_granted_permissions() {
        let handle = spawn_with_permissions(Arc::new(MockPermissions::new(true)));
        let mut outputs = handle.subscribe_outputs();

        handle.dispatch(Message::Permissions(PermissionMessage::Initialize));

        let perms = next_permission_output(&mut outputs).await;
        assert!(perms.microphone);
        assert!(handle.state().borrow().permissions.microphone);
    }

    #[tokio::test]
    async fn initialize_stays_silent_when_nothing_is_granted() {
        let handle = spawn_with_permissions(Arc::new(MockPermissions::new(false)));
        let mut outputs = handle.subscribe_outputs();

        handle.dispatch(Message::Permissions(PermissionMessage::Initialize));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(matches!(
            outputs.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
        assert!(!handle.state().borrow().permissions.microphone);
    }

    #[tokio::test]
    async fn request_round_trips_through_the_callback() {
        let handle = spawn_with_permissions(Arc::new(MockPermissions::new(true)));
        let mut outputs = handle.subscribe_outputs();

        handle.dispatch(Message::Permissions(PermissionMessage::Request(
            PermissionKind::Microphone,
        )));

        let perms = next_permission_output(&mut outputs).await;
        assert!(perms.microphone);
    }

    #[tokio::test]
    async fn double_registration_is_a_setup_error() {
        let adapter = Arc::new(MockPermissions::new(true));
        let switchboard = Switchboard::new();

        let first = PermissionRouter::new(adapter.clone(), switchboard.dispatcher());
        assert!(first.is_ok());

        let second = PermissionRouter::new(adapter, switchboard.dispatcher());
        assert!(matches!(second, Err(SetupError::AlreadyRegistered)));
    }
}
