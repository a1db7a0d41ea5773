mod crash_recovery_tests;
mod recovery_tests;
mod rotation_tests;
