/*++

Licensed under the Apache-2.0 license.

File Name:

    mod.rs

Abstract:

    File contains exports for code useful for testing Bus traits.

--*/
mod fake_regs;
mod log;

pub use fake_regs::FakeRegs;
pub use log::Log;
