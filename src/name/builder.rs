// Copyright 2021 Matthew Ingwersen.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! Incremental construction of [`Name`]s from presentation format.

use arrayvec::ArrayVec;

use super::{Error, Name, MAX_LABEL_LEN, MAX_N_LABELS, MAX_WIRE_LEN};

/// Accumulates a [`Name`] one octet at a time.
///
/// The wire representation grows in a fixed buffer sized for the
/// longest valid name. The current label's length octet sits at
/// `current` and is filled in when the label ends, so a fresh builder
/// holds just the null label. Failed calls leave the builder as it was.
pub(super) struct NameBuilder {
    wire: ArrayVec<u8, MAX_WIRE_LEN>,
    offsets: ArrayVec<u8, MAX_N_LABELS>,
    current: usize,
}

impl NameBuilder {
    pub fn new() -> Self {
        let mut builder = Self {
            wire: ArrayVec::new(),
            offsets: ArrayVec::new(),
            current: 0,
        };
        builder.wire.push(0);
        builder.offsets.push(0);
        builder
    }

    fn current_len(&self) -> usize {
        self.wire.len() - self.current - 1
    }

    /// Whether the label being built is still empty, i.e. whether the
    /// name so far would end in the null label.
    pub fn in_null_label(&self) -> bool {
        self.current_len() == 0
    }

    /// Appends `octet` to the current label.
    pub fn push_octet(&mut self, octet: u8) -> Result<(), Error> {
        if self.current_len() == MAX_LABEL_LEN {
            return Err(Error::LabelTooLong);
        }
        self.wire.try_push(octet).or(Err(Error::NameTooLong))
    }

    /// Closes the current label and opens a new, empty one. The label
    /// being closed must not be null.
    pub fn end_label(&mut self) -> Result<(), Error> {
        if self.in_null_label() {
            return Err(Error::NullNonTerminal);
        }
        if self.wire.is_full() {
            return Err(Error::NameTooLong);
        }
        self.wire[self.current] = self.current_len() as u8;
        self.current = self.wire.len();
        self.wire.push(0);

        // Every closed label holds at least two wire octets, so the
        // offsets cannot outgrow the wire buffer's label capacity.
        self.offsets.push(self.current as u8);
        Ok(())
    }

    /// Produces the name. The last label must be the null label.
    pub fn finish(self) -> Result<Name, Error> {
        if self.in_null_label() {
            Ok(Name::from_parts(&self.offsets, &self.wire))
        } else {
            Err(Error::NonNullTerminal)
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn push_label(builder: &mut NameBuilder, label: &[u8]) {
        for &octet in label {
            builder.push_octet(octet).unwrap();
        }
        builder.end_label().unwrap();
    }

    #[test]
    fn fresh_builder_is_root() {
        assert_eq!(NameBuilder::new().finish(), Ok(Name::root()));
    }

    #[test]
    fn builds_multi_label_names() {
        let mut builder = NameBuilder::new();
        push_label(&mut builder, b"insignia");
        push_label(&mut builder, b"live");
        assert_eq!(builder.finish(), Ok("insignia.live.".parse().unwrap()));
    }

    #[test]
    fn unterminated_name_is_rejected() {
        let mut builder = NameBuilder::new();
        builder.push_octet(b'x').unwrap();
        assert_eq!(builder.finish(), Err(Error::NonNullTerminal));
    }

    #[test]
    fn label_length_is_limited() {
        let mut builder = NameBuilder::new();
        for _ in 0..MAX_LABEL_LEN {
            builder.push_octet(b'x').unwrap();
        }
        assert_eq!(builder.push_octet(b'x'), Err(Error::LabelTooLong));
        assert!(builder.end_label().is_ok());
    }

    #[test]
    fn name_length_is_limited() {
        let mut builder = NameBuilder::new();
        for _ in 0..MAX_N_LABELS - 1 {
            push_label(&mut builder, b"x");
        }
        assert_eq!(builder.push_octet(b'x'), Err(Error::NameTooLong));
        assert!(builder.finish().is_ok());
    }

    #[test]
    fn empty_labels_are_rejected() {
        let mut builder = NameBuilder::new();
        assert_eq!(builder.end_label(), Err(Error::NullNonTerminal));
    }
}
