// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use core::fmt;

/// Vendor status code returned by every driver call.
///
/// Zero is success. Negative values are vendor-defined error codes, mapped to
/// a human readable string by [`Status::message`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Status(pub i32);

impl Status {
    pub const SUCCESS: Status = Status(0);
    pub const FAILED: Status = Status(-1);
    pub const INTERNAL_ERROR: Status = Status(-2);
    pub const NOT_SUPPORTED: Status = Status(-4);
    pub const NOT_INITIALIZED: Status = Status(-5);
    pub const PARAMETER_INVALID: Status = Status(-6);
    pub const PARAMETER_OUT_OF_BOUND: Status = Status(-7);
    pub const SIZE_MISMATCH: Status = Status(-11);
    /// The only transient code: no frame arrived within the read timeout.
    pub const TIMEOUT: Status = Status(-12);
    pub const IO_ERROR: Status = Status(-13);
    pub const COMM_ERROR: Status = Status(-14);
    pub const BUS_ERROR: Status = Status(-15);
    pub const NO_DEVICE_FOUND: Status = Status(-16);
    pub const DEVICE_IS_OPENED: Status = Status(-18);
    pub const DEVICE_IS_CLOSED: Status = Status(-19);
    pub const NO_MEMORY: Status = Status(-21);

    pub fn code(self) -> i32 {
        self.0
    }

    pub fn is_ok(self) -> bool {
        self.0 == 0
    }

    pub fn is_timeout(self) -> bool {
        self == Status::TIMEOUT
    }

    /// Converts the status into a `Result`, keeping the failing status.
    pub fn ok(self) -> Result<(), Status> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(self)
        }
    }

    pub fn message(self) -> &'static str {
        match self.0 {
            0 => "success",
            -1 => "operation failed",
            -2 => "internal error",
            -3 => "unknown error",
            -4 => "not supported",
            -5 => "not initialized",
            -6 => "invalid parameter",
            -7 => "parameter out of bound",
            -8 => "not enabled",
            -9 => "cancelled by user",
            -10 => "path not found",
            -11 => "image size mismatch",
            -12 => "timed out",
            -13 => "hardware i/o error",
            -14 => "communication error",
            -15 => "bus error",
            -16 => "no device found",
            -17 => "no logical device found",
            -18 => "device already opened",
            -19 => "device is closed",
            -20 => "video stream closed",
            -21 => "out of memory",
            _ => "vendor error",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.0)
    }
}
