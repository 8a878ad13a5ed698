// Copyright (c) 2024 Mudit Bhargava
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.
//

// parser.rs
//
// This file contains the trace-file parser. A trace is one instruction per
// line: hex address, functional unit type, destination register, two source
// registers, and for branch lines a hex target address plus the actual
// taken flag.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::errors::SimulatorError;
use crate::instruction::{Instruction, NUM_REGS};

/// Parse a whole trace file into decoded instructions.
///
/// `ip` is set to the (zero-based) line position; `idx` is left at zero and
/// assigned by the pipeline at fetch time.
pub fn parse_trace<P: AsRef<Path>>(path: P) -> Result<Vec<Instruction>, SimulatorError> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| SimulatorError::TraceUnreadable(path.to_path_buf(), e))?;
    let reader = BufReader::new(file);

    let mut instructions = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let mut inst = parse_line(&line, line_no + 1)?;
        inst.ip = instructions.len();
        instructions.push(inst);
    }

    if instructions.is_empty() {
        return Err(SimulatorError::EmptyTrace);
    }

    Ok(instructions)
}

/// Parse a single trace line. `line_no` is one-based and used for error
/// reporting only.
pub fn parse_line(line: &str, line_no: usize) -> Result<Instruction, SimulatorError> {
    let fields: Vec<&str> = line.split_whitespace().collect();

    if fields.len() != 5 && fields.len() != 7 {
        return Err(malformed(line_no, format!("expected 5 or 7 fields, found {}", fields.len())));
    }

    let addr = parse_hex(fields[0], line_no, "instruction address")?;
    let fu_type = parse_fu_type(fields[1], line_no)?;
    let dest_reg = parse_reg(fields[2], line_no, "destination register")?;
    let src1_reg = parse_reg(fields[3], line_no, "source register 1")?;
    let src2_reg = parse_reg(fields[4], line_no, "source register 2")?;

    let (branch_addr, taken) = if fields.len() == 7 {
        let target = parse_hex(fields[5], line_no, "branch target")?;
        let taken = match fields[6] {
            "0" => false,
            "1" => true,
            other => {
                return Err(malformed(line_no, format!("branch outcome must be 0 or 1, found {:?}", other)))
            },
        };
        (Some(target), taken)
    } else {
        (None, false)
    };

    Ok(Instruction {
        idx: 0,
        ip: 0,
        addr,
        fu_type,
        dest_reg,
        src_regs: [src1_reg, src2_reg],
        branch_addr,
        taken,
        predicted: false,
        speculative: false,
    })
}

fn malformed(line: usize, reason: String) -> SimulatorError {
    SimulatorError::MalformedTraceLine { line, reason }
}

fn parse_hex(field: &str, line_no: usize, what: &str) -> Result<u32, SimulatorError> {
    let digits = field.trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(digits, 16)
        .map_err(|_| malformed(line_no, format!("{} is not a hex value: {:?}", what, field)))
}

fn parse_fu_type(field: &str, line_no: usize) -> Result<usize, SimulatorError> {
    match field.parse::<i32>() {
        // Legacy traces use -1 for "any unit"; normalized to type 1.
        Ok(-1) => Ok(1),
        Ok(t @ 0..=2) => Ok(t as usize),
        _ => Err(malformed(line_no, format!("functional unit type must be -1, 0, 1 or 2, found {:?}", field))),
    }
}

fn parse_reg(field: &str, line_no: usize, what: &str) -> Result<Option<usize>, SimulatorError> {
    match field.parse::<i32>() {
        Ok(-1) => Ok(None),
        Ok(r) if (0..NUM_REGS as i32).contains(&r) => Ok(Some(r as usize)),
        _ => Err(malformed(
            line_no,
            format!("{} must be in -1..{}, found {:?}", what, NUM_REGS - 1, field),
        )),
    }
}
