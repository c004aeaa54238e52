//! Context propagation doubles.

use managed_executor::{ContextScope, ContextService};
use std::cell::RefCell;
use std::sync::Arc;

thread_local! {
    static ACTIVE_TENANT: RefCell<Option<String>> = RefCell::new(None);
}

/// The tenant visible to the currently running code, if any. Work item
/// bodies and contextual observer callbacks read this to prove they ran
/// inside the submitter's captured environment.
pub fn current_tenant() -> Option<String> {
    ACTIVE_TENANT.with(|slot| slot.borrow().clone())
}

/// Context service propagating a tenant label through a thread-local, the
/// way request-scoped state travels in a hosting runtime.
pub struct TenantContextService {
    pub tenant: String,
}

impl TenantContextService {
    pub fn new(tenant: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            tenant: tenant.into(),
        })
    }
}

impl ContextService for TenantContextService {
    fn capture(&self) -> Arc<dyn ContextScope> {
        Arc::new(TenantScope {
            tenant: self.tenant.clone(),
        })
    }
}

struct TenantScope {
    tenant: String,
}

impl ContextScope for TenantScope {
    fn run(&self, work: &mut dyn FnMut()) {
        struct Restore(Option<String>);
        impl Drop for Restore {
            fn drop(&mut self) {
                let previous = self.0.take();
                ACTIVE_TENANT.with(|slot| *slot.borrow_mut() = previous);
            }
        }

        // Restores on unwind too; the scope contract requires it
        let _restore =
            Restore(ACTIVE_TENANT.with(|slot| slot.replace(Some(self.tenant.clone()))));
        work();
    }
}
