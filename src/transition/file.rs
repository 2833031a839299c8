use std::io::{Read, Write};

use crate::error::{Error, Result};

use super::TransitionModel;

const FORMAT: &str = "dbgsample-transition-model-v1";

impl TransitionModel {
    /// Writes a format tag followed by the model as CBOR.
    pub fn write(&self, output: &mut impl Write) -> Result<()> {
        ciborium::into_writer(FORMAT, &mut *output)?;
        ciborium::into_writer(self, output)?;
        Ok(())
    }

    pub fn read(input: &mut impl Read) -> Result<Self> {
        let format: String = ciborium::from_reader(&mut *input)?;
        if format != FORMAT {
            return Err(Error::ModelFormat {
                found: format,
                expected: FORMAT.to_string(),
            });
        }
        Ok(ciborium::from_reader(input)?)
    }
}
