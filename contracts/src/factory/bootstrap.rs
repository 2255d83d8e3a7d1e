//! # Access Bootstrap
//!
//! The orchestrator never holds the authority to wire an instance
//! permanently. When it needs to perform a privileged operation on a
//! component it does not control, it opens a [`BootstrapWindow`]:
//!
//! ```text
//! 1. grant itself Role::Bootstrap          (as Provisioner)
//! 2. requirement(op) := Bootstrap          (remembering the original)
//! 3. perform op                            (through the window)
//! 4. requirement(op) := original
//! 5. renounce Role::Bootstrap
//! ```
//!
//! Steps 4 and 5 run on every exit path. [`BootstrapWindow::close`] runs
//! them and reports failure; if the window is dropped without being closed
//! (the operation failed, an early return, a panic) `Drop` runs them on a
//! best-effort basis and logs at `error` level if it cannot.
//!
//! The standing `Provisioner` capability that makes windows possible is
//! released by [`release_standing_capability`] once the instance is
//! complete.

use tessera_protocol::{Address, FactoryResult, Operation, Role};

use crate::ledger::Ledger;

/// A scoped, single-operation elevation on one access controller.
#[must_use = "a bootstrap window is closed when dropped"]
pub struct BootstrapWindow<'a> {
    ledger: &'a mut Ledger,
    controller: Address,
    orchestrator: Address,
    operation: Operation,
    original: Role,
    closed: bool,
}

impl<'a> BootstrapWindow<'a> {
    /// Runs steps 1 and 2. If step 2 fails, step 1 is undone before the
    /// error is returned.
    pub fn open(
        ledger: &'a mut Ledger,
        controller: Address,
        orchestrator: Address,
        operation: Operation,
    ) -> FactoryResult<Self> {
        ledger.grant_role(orchestrator, controller, Role::Bootstrap, orchestrator)?;

        let original =
            match ledger.set_requirement(orchestrator, controller, operation, Role::Bootstrap) {
                Ok(original) => original,
                Err(e) => {
                    if let Err(undo) = ledger.renounce_role(orchestrator, controller, Role::Bootstrap) {
                        tracing::error!(%controller, error = %undo, "failed to drop bootstrap role");
                    }
                    return Err(e);
                }
            };

        tracing::debug!(%controller, %operation, %original, "bootstrap window opened");
        Ok(Self {
            ledger,
            controller,
            orchestrator,
            operation,
            original,
            closed: false,
        })
    }

    /// The ledger, for performing the window's operation as the
    /// orchestrator.
    pub fn ledger(&mut self) -> &mut Ledger {
        &mut *self.ledger
    }

    /// Runs steps 4 and 5.
    pub fn close(mut self) -> FactoryResult<()> {
        self.closed = true;
        self.restore()?;
        tracing::debug!(
            controller = %self.controller,
            operation = %self.operation,
            "bootstrap window closed"
        );
        Ok(())
    }

    /// Steps 4 and 5. Step 5 runs even when step 4 fails; the first
    /// failure is returned.
    fn restore(&mut self) -> FactoryResult<()> {
        let requirement = self
            .ledger
            .set_requirement(self.orchestrator, self.controller, self.operation, self.original)
            .map(|_| ());
        let renounced = self
            .ledger
            .renounce_role(self.orchestrator, self.controller, Role::Bootstrap);
        requirement.and(renounced)
    }
}

impl Drop for BootstrapWindow<'_> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        match self.restore() {
            Ok(()) => tracing::debug!(
                controller = %self.controller,
                operation = %self.operation,
                "bootstrap window restored on abort"
            ),
            Err(e) => tracing::error!(
                controller = %self.controller,
                operation = %self.operation,
                error = %e,
                "failed to restore bootstrap window"
            ),
        }
    }
}

/// Opens a window for `operation`, runs `f` through it and closes it.
pub fn with_window<T>(
    ledger: &mut Ledger,
    controller: Address,
    orchestrator: Address,
    operation: Operation,
    f: impl FnOnce(&mut Ledger) -> FactoryResult<T>,
) -> FactoryResult<T> {
    let mut window = BootstrapWindow::open(ledger, controller, orchestrator, operation)?;
    let out = f(window.ledger())?;
    window.close()?;
    Ok(out)
}

/// Renounces the orchestrator's standing `Provisioner` role on
/// `controller`. Called once, on the transition to fully complete.
pub fn release_standing_capability(
    ledger: &mut Ledger,
    controller: Address,
    orchestrator: Address,
) -> FactoryResult<()> {
    ledger.renounce_role(orchestrator, controller, Role::Provisioner)?;
    tracing::info!(%controller, "standing provisioner capability released");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{AccessPayload, ComponentInit};
    use tessera_protocol::seed::{auto_master_seed, derive_component_seed};
    use tessera_protocol::{AuthorizationError, ComponentKind, FactoryError};

    fn factory() -> Address {
        Address::labelled("factory")
    }

    fn owner() -> Address {
        Address::labelled("owner")
    }

    fn setup() -> (Ledger, Address) {
        let mut ledger = Ledger::new();
        let template = Address::labelled("ac-template");
        ledger
            .publish_implementation(template, ComponentKind::AccessController)
            .unwrap();
        let seed = derive_component_seed(&auto_master_seed(1), ComponentKind::AccessController);
        let ac = ledger
            .deploy(factory(), &seed, ComponentKind::AccessController, template)
            .unwrap();
        ledger
            .initialize(
                factory(),
                ac,
                ComponentInit::AccessController(AccessPayload {
                    owners: vec![owner()],
                    provisioners: vec![factory()],
                    ..AccessPayload::default()
                }),
            )
            .unwrap();
        (ledger, ac)
    }

    fn grant_op() -> Operation {
        Operation::ManageRole(Role::ApprovedCaller)
    }

    #[test]
    fn window_allows_exactly_one_operation() {
        let (mut ledger, ac) = setup();
        let target = Address::labelled("component");

        with_window(&mut ledger, ac, factory(), grant_op(), |ledger| {
            ledger.grant_role(factory(), ac, Role::ApprovedCaller, target)?;
            let other = ledger.grant_role(factory(), ac, Role::Admin, target);
            assert!(matches!(
                other,
                Err(FactoryError::Authorization(AuthorizationError::MissingRole { .. }))
            ));
            Ok(())
        })
        .unwrap();

        let controller = ledger.access_controller(&ac).unwrap();
        assert!(controller.has_role(Role::ApprovedCaller, &target));
        assert!(!controller.has_role(Role::Bootstrap, &factory()));
        assert_eq!(controller.required_role(grant_op()), Role::Owner);
        assert_eq!(controller.overridden_requirements(), 0);
    }

    #[test]
    fn failed_operation_still_restores() {
        let (mut ledger, ac) = setup();

        let result: FactoryResult<()> =
            with_window(&mut ledger, ac, factory(), grant_op(), |ledger| {
                ledger.grant_role(factory(), ac, Role::ApprovedCaller, Address::labelled("x"))?;
                Err(AuthorizationError::NotFactoryOwner(factory()).into())
            });
        assert!(result.is_err());

        let controller = ledger.access_controller(&ac).unwrap();
        assert!(!controller.has_role(Role::Bootstrap, &factory()));
        assert_eq!(controller.required_role(grant_op()), Role::Owner);
        assert_eq!(controller.revocation_count(Role::Bootstrap, &factory()), 1);
    }

    #[test]
    fn panic_inside_window_restores() {
        let (mut ledger, ac) = setup();

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _window = BootstrapWindow::open(&mut ledger, ac, factory(), grant_op()).unwrap();
            panic!("operation blew up");
        }));
        assert!(outcome.is_err());

        let controller = ledger.access_controller(&ac).unwrap();
        assert!(!controller.has_role(Role::Bootstrap, &factory()));
        assert_eq!(controller.required_role(grant_op()), Role::Owner);
    }

    #[test]
    fn bootstrap_role_is_dropped_even_if_requirement_cannot_be_restored() {
        let (mut ledger, ac) = setup();

        let mut window = BootstrapWindow::open(&mut ledger, ac, factory(), grant_op()).unwrap();
        window
            .ledger()
            .renounce_role(factory(), ac, Role::Provisioner)
            .unwrap();
        assert_eq!(
            window.close().unwrap_err(),
            FactoryError::Authorization(AuthorizationError::RequirementChangeDenied(factory()))
        );

        let controller = ledger.access_controller(&ac).unwrap();
        assert!(!controller.has_role(Role::Bootstrap, &factory()));
        assert_eq!(controller.required_role(grant_op()), Role::Bootstrap);
    }

    #[test]
    fn window_needs_provisioner() {
        let (mut ledger, ac) = setup();
        release_standing_capability(&mut ledger, ac, factory()).unwrap();

        assert!(BootstrapWindow::open(&mut ledger, ac, factory(), grant_op()).is_err());
        let controller = ledger.access_controller(&ac).unwrap();
        assert!(!controller.has_role(Role::Bootstrap, &factory()));
    }

    #[test]
    fn release_twice_fails() {
        let (mut ledger, ac) = setup();
        release_standing_capability(&mut ledger, ac, factory()).unwrap();
        assert!(release_standing_capability(&mut ledger, ac, factory()).is_err());
        assert_eq!(
            ledger
                .access_controller(&ac)
                .unwrap()
                .revocation_count(Role::Provisioner, &factory()),
            1
        );
    }
}
