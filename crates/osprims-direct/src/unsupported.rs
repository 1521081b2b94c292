use std::fs::File;

use crate::{AlignmentRequirements, Reason};

pub fn determine_impl(_file: &File) -> Result<AlignmentRequirements, Reason> {
    Err(Reason::PlatformUnsupported)
}

pub fn enable_impl(_file: &File) -> Result<(), Reason> {
    Err(Reason::PlatformUnsupported)
}

pub fn disable_impl(_file: &File) -> Result<(), Reason> {
    Ok(())
}
