// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2020-2022 Andre Richter <andre.o.richter@gmail.com>

//! Asynchronous exception handling.

#[cfg(target_arch = "aarch64")]
#[path = "../arch/aarch64/exception/asynchronous.rs"]
mod arch_asynchronous;

use crate::platform;

//--------------------------------------------------------------------------------------------------
// Architectural Public Reexports
//--------------------------------------------------------------------------------------------------

pub use arch_asynchronous::{
    is_local_irq_masked, local_irq_mask, local_irq_mask_save, local_irq_restore, local_irq_unmask,
    print_state,
};

//--------------------------------------------------------------------------------------------------
// Platform Public Reexports
//--------------------------------------------------------------------------------------------------

pub use platform::exception::asynchronous::{irq_map, IRQNumber};

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

/// Interrupt handling interfaces.
pub mod interface {
    /// Implemented by types that handle a single IRQ.
    pub trait IRQHandler {
        /// Called when the corresponding interrupt is asserted.
        fn handle(&self) -> Result<(), &'static str>;
    }

    /// An interrupt controller that manages and dispatches to a set of IRQ handlers.
    pub trait IRQManager {
        type IRQNumberType;

        /// Register a handler for `descriptor.number`.
        ///
        /// It is a no-op if a handler is already registered for this number.
        fn register_handler(
            &self,
            descriptor: super::IRQHandlerDescriptor<Self::IRQNumberType>,
        ) -> Result<(), &'static str>;

        /// Enable the interrupt identified by `irq_number` at the controller.
        fn enable(&self, irq_number: &Self::IRQNumberType);

        /// Dispatch to the handler registered for the currently pending IRQ(s).
        ///
        /// # Safety
        ///
        /// - Must only be called from IRQ context, with the `IRQContext` token proving it.
        fn handle_pending_irqs<'irq_context>(
            &'irq_context self,
            ic: &super::IRQContext<'irq_context>,
        );

        /// Print list of registered IRQ handlers.
        fn print_handler(&self) {}
    }
}

/// Describes a (number, name, handler) triple for an IRQ.
#[derive(Copy, Clone)]
pub struct IRQHandlerDescriptor<T>
where
    T: Copy,
{
    /// The IRQ number.
    number: T,

    /// A textual name for the handler, used for introspection.
    name: &'static str,

    /// The actual handler.
    handler: &'static (dyn interface::IRQHandler + Sync),
}

/// A token that is only valid while executing in IRQ context.
///
/// Dispatching functions use this as proof that they were really called from IRQ context.
#[derive(Clone, Copy)]
pub struct IRQContext<'irq_context> {
    _0: core::marker::PhantomData<&'irq_context ()>,
}

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

impl<T> IRQHandlerDescriptor<T>
where
    T: Copy,
{
    /// Create an instance.
    pub const fn new(
        number: T,
        name: &'static str,
        handler: &'static (dyn interface::IRQHandler + Sync),
    ) -> Self {
        Self {
            number,
            name,
            handler,
        }
    }

    /// The IRQ number.
    pub const fn number(&self) -> T {
        self.number
    }

    /// The handler's name.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The actual handler.
    pub const fn handler(&self) -> &'static (dyn interface::IRQHandler + Sync) {
        self.handler
    }
}

impl<'irq_context> IRQContext<'irq_context> {
    /// Creates an instance.
    ///
    /// # Safety
    ///
    /// - This must only be called when the current core is in an interrupt context and will not
    ///   live beyond the end of it. That is, creation is allowed in interrupt vector functions, for
    ///   example.
    #[allow(clippy::new_without_default)]
    pub unsafe fn new() -> Self {
        Self {
            _0: core::marker::PhantomData,
        }
    }
}

/// Executes `f` with IRQs masked on the local core, restoring the previous mask state afterwards.
pub fn exec_with_irq_masked<T>(f: impl FnOnce() -> T) -> T {
    let saved = local_irq_mask_save();
    let ret = f();
    local_irq_restore(saved);

    ret
}

/// Returns a reference to the global, platform-specific IRQ manager.
pub fn irq_manager() -> &'static dyn interface::IRQManager<IRQNumberType = IRQNumber> {
    platform::exception::asynchronous::irq_manager()
}

//--------------------------------------------------------------------------------------------------
// Testing
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn exec_with_irq_masked_restores_state() {
        let before = is_local_irq_masked();
        exec_with_irq_masked(|| {});
        assert_eq!(before, is_local_irq_masked());
    }
}
