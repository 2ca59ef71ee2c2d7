pub use crate::executor::{JoinHandle, Task};
pub use crate::native::{self, Design, ProcessCtx};
pub use crate::rstb_obj::RstbObj;
pub use crate::signal::SimObject;
pub use crate::sim_if::{SimIf, SIM_IF};
pub use crate::testbench::{clock, reset_dut};
pub use crate::trigger::{Phase, Trigger};
pub use crate::utils::{self, clock_cycles, with_timeout};
pub use crate::value::Val;
pub use crate::{fail_test, fail_test_with, pass_test};
pub use crate::{RstbErr, RstbResult, SimReport, SimpleResult, TbConfig, Test};
pub use futures::future::FutureExt;
