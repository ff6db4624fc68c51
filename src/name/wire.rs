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

//! Parsing of compressed on-the-wire names.

use arrayvec::ArrayVec;

use super::{Error, Name, MAX_LABEL_LEN, MAX_N_LABELS, MAX_WIRE_LEN};

/// Parses a compressed name starting at index `start` of `octets`.
/// Pointers are followed. Indices given in pointers are treated as
/// indices of `octets`, so the intention is for an entire DNS message
/// to be passed in `octets`. This is the implementation of
/// [`Name::try_from_compressed`].
pub fn parse_compressed_name(octets: &[u8], start: usize) -> Result<(Name, usize), Error> {
    let mut next_chunk = Some(start);
    let mut wire_len_of_first_chunk = None;

    let mut label_offsets = ArrayVec::<u8, MAX_N_LABELS>::new();
    let mut wire_repr = ArrayVec::<u8, MAX_WIRE_LEN>::new();

    while let Some(chunk_start) = next_chunk {
        let mut index = chunk_start;
        loop {
            let len = *octets.get(index).ok_or(Error::UnexpectedEom)?;
            if len & 0xc0 == 0xc0 {
                next_chunk = Some(parse_pointer(octets, chunk_start, index)?);
                index += 2;
                break;
            } else if len > (MAX_LABEL_LEN as u8) {
                return Err(Error::LabelTooLong);
            }

            let end_of_label = index + len as usize + 1;
            if len != 0 && end_of_label >= octets.len() {
                return Err(Error::UnexpectedEom);
            }
            label_offsets
                .try_push(wire_repr.len() as u8)
                .or(Err(Error::NameTooLong))?;
            wire_repr
                .try_extend_from_slice(&octets[index..end_of_label])
                .or(Err(Error::NameTooLong))?;
            index = end_of_label;
            if len == 0 {
                next_chunk = None;
                break;
            }
        }
        wire_len_of_first_chunk.get_or_insert(index - chunk_start);
    }

    let consumed = wire_len_of_first_chunk.unwrap_or_default();
    Ok((Name::from_parts(&label_offsets, &wire_repr), consumed))
}

/// Parses a pointer at `index` in `octets`. This also checks that the
/// pointer refers to an index *earlier* than the start of the chunk it
/// is in (`chunk_start`).
fn parse_pointer(octets: &[u8], chunk_start: usize, index: usize) -> Result<usize, Error> {
    if index + 1 < octets.len() {
        let pointer = u16::from_be_bytes([octets[index], octets[index + 1]]) & !0xc000;
        if (pointer as usize) >= chunk_start {
            // RFC 1035 § 4.1.4 pointers refer to a *prior* occurrence
            // of the name, which also rules out loops.
            Err(Error::InvalidPointer)
        } else {
            Ok(pointer as usize)
        }
    } else {
        Err(Error::UnexpectedEom)
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
