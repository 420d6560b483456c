// Copyright 2019 Zhizhesihai (Beijing) Technology Limited.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// See the License for the specific language governing permissions and
// limitations under the License.

extern crate error_chain;
extern crate serde_json;

use std::borrow::Cow;
use std::sync::PoisonError;

error_chain! {
    types {
        Error, ErrorKind, ResultExt, Result;
    }
    errors {
        Poisoned {
            description("a thread holding the locked panicked and poisoned the lock")
        }

        IllegalState(desc: String) {
            description(desc)
            display("Illegal state: {}", desc)
        }

        IllegalArgument(desc: String) {
            description(desc)
            display("Illegal argument: {}", desc)
        }

        IndexOutOfBounds(desc: String) {
            description(desc)
            display("Index out of bounds: {}", desc)
        }

        UnexpectedEOF(errmsg: String) {
            description(errmsg)
            display("Unexpected EOF: {}", errmsg)
        }

        CorruptIndex(errmsg: String) {
            description(errmsg)
            display("Corrupt Index: {}", errmsg)
        }

        AlreadyClosed(errmsg: String) {
            description(errmsg)
            display("Already closed: {}", errmsg)
        }

        UnsupportedOperation(errmsg: Cow<'static, str>) {
            description(errmsg),
            display("Unsupported Operation: {}", errmsg)
        }

        RuntimeError(errmsg: String) {
            description(errmsg)
            display("Runtime Error: {}", errmsg)
        }
    }

    foreign_links {
        FmtError(::std::fmt::Error);
        IoError(::std::io::Error);
        FromUtf8Err(::std::string::FromUtf8Error);
        Utf8Error(::std::str::Utf8Error);
        NumError(::std::num::ParseIntError);
        SerdeJsonError(self::serde_json::Error);
    }
}

impl<Guard> From<PoisonError<Guard>> for Error {
    fn from(_: PoisonError<Guard>) -> Error {
        ErrorKind::Poisoned.into()
    }
}

/// Returns true when the error is a `CorruptIndex` error.
pub fn is_corrupt_index(e: &Error) -> bool {
    match e.kind() {
        ErrorKind::CorruptIndex(_) => true,
        _ => false,
    }
}
