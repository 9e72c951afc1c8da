// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use std::io::Read;

use crate::error::Result;

use super::{byte::ByteRleDecoder, PrimitiveValueDecoder};

pub struct BooleanDecoder<R: Read> {
    decoder: ByteRleDecoder<R>,
    data: u8,
    bits_in_data: usize,
}

impl<R: Read> BooleanDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            decoder: ByteRleDecoder::new(reader),
            bits_in_data: 0,
            data: 0,
        }
    }

    pub fn value(&mut self) -> bool {
        let value = (self.data & 0x80) != 0;
        self.data <<= 1;
        self.bits_in_data -= 1;

        value
    }

    /// Consume and return the next bit without going through a slice.
    pub fn next_bit(&mut self) -> Result<bool> {
        if self.bits_in_data == 0 {
            let mut data = [0];
            self.decoder.decode(&mut data)?;
            self.data = data[0] as u8;
            self.bits_in_data = 8;
        }
        Ok(self.value())
    }

    /// Count how many of the next `n` bits are set, without materializing them.
    pub fn count_set_bits(&mut self, n: usize) -> Result<usize> {
        let mut count = 0;
        for _ in 0..n {
            if self.next_bit()? {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Decode the next `n` bits into `out`, appending the 0-based index of
    /// every set bit.
    pub fn fill_set_vector(&mut self, n: usize, out: &mut Vec<usize>) -> Result<()> {
        for i in 0..n {
            if self.next_bit()? {
                out.push(i);
            }
        }
        Ok(())
    }

    /// Decode `is_null.len()` present bits, one per `false` entry in
    /// `is_null`, treating `true` entries as already-known nulls that
    /// consume no bit from the stream. Matches how a present stream is
    /// only ever written for values not already excluded upstream.
    pub fn fill_with_null_mask(&mut self, out: &mut [bool], is_null: &[bool]) -> Result<()> {
        debug_assert_eq!(out.len(), is_null.len());
        for (o, &null) in out.iter_mut().zip(is_null) {
            *o = if null { false } else { self.next_bit()? };
        }
        Ok(())
    }
}

impl<R: Read> PrimitiveValueDecoder<bool> for BooleanDecoder<R> {
    fn decode(&mut self, out: &mut [bool]) -> Result<()> {
        for x in out.iter_mut() {
            *x = self.next_bit()?;
        }
        Ok(())
    }

    fn skip(&mut self, n: usize) -> Result<()> {
        for _ in 0..n {
            self.next_bit()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic() {
        let expected = vec![false; 800];
        let data = [0x61u8, 0x00];
        let data = &mut data.as_ref();
        let mut decoder = BooleanDecoder::new(data);
        let mut actual = vec![true; expected.len()];
        decoder.decode(&mut actual).unwrap();
        assert_eq!(actual, expected)
    }

    #[test]
    fn literals() {
        let expected = vec![
            false, true, false, false, false, true, false, false, // 0b01000100
            false, true, false, false, false, true, false, true, // 0b01000101
        ];
        let data = [0xfeu8, 0b01000100, 0b01000101];
        let data = &mut data.as_ref();
        let mut decoder = BooleanDecoder::new(data);
        let mut actual = vec![true; expected.len()];
        decoder.decode(&mut actual).unwrap();
        assert_eq!(actual, expected)
    }

    #[test]
    fn another() {
        // "For example, the byte sequence [0xff, 0x80] would be one true followed by seven false values."
        let expected = vec![true, false, false, false, false, false, false, false];
        let data = [0xff, 0x80];
        let data = &mut data.as_ref();
        let mut decoder = BooleanDecoder::new(data);
        let mut actual = vec![true; expected.len()];
        decoder.decode(&mut actual).unwrap();
        assert_eq!(actual, expected)
    }

    #[test]
    fn skip_then_decode_remainder() {
        // 800 false bits; skip the first 200 and check the rest still decodes.
        let data = [0x61u8, 0x00];
        let data = &mut data.as_ref();
        let mut decoder = BooleanDecoder::new(data);
        decoder.skip(200).unwrap();
        let mut actual = vec![true; 600];
        decoder.decode(&mut actual).unwrap();
        assert_eq!(actual, vec![false; 600]);
    }

    #[test]
    fn count_set_bits_counts_without_materializing() {
        let data = [0xffu8, 0x80];
        let data = &mut data.as_ref();
        let mut decoder = BooleanDecoder::new(data);
        let count = decoder.count_set_bits(8).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn fill_set_vector_collects_set_indices() {
        let data = [0xffu8, 0x80];
        let data = &mut data.as_ref();
        let mut decoder = BooleanDecoder::new(data);
        let mut set = vec![];
        decoder.fill_set_vector(8, &mut set).unwrap();
        assert_eq!(set, vec![0]);
    }

    #[test]
    fn fill_with_null_mask_skips_known_nulls() {
        // Stream carries present bits only for non-null slots: true, false, true.
        let data = [0xfeu8, 0b1010_0000, 0b0000_0000];
        let data = &mut data.as_ref();
        let mut decoder = BooleanDecoder::new(data);
        let is_null = vec![false, true, false];
        let mut out = vec![false; 3];
        decoder.fill_with_null_mask(&mut out, &is_null).unwrap();
        assert_eq!(out, vec![true, false, false]);
    }
}
