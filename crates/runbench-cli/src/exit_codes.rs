//! Exit codes for runbench.
//! Under the default `continue` policy child failures do not change the exit code.

pub const SUCCESS: i32 = 0;
pub const STEP_FAILED: i32 = 1; // A step failed and the policy is `abort`
pub const INTERNAL_ERROR: i32 = 2; // Config error, report write failure, bad arguments
