//! Bristol-Fashion Boolean circuits.
//!
//! The text format: a header line `nGates nWires`, a line with the number of
//! input values followed by their wire counts, the same for outputs, then
//! one gate per line as `nin nout in_1 .. in_nin out_1 .. out_nout OP`. Wire
//! indices are 0-based; input wires occupy the lowest indices and output
//! wires the highest. `EQ` assigns the constant given in its input slot,
//! `EQW` copies a wire, and `MAND` is a multi-AND taking 2n inputs (all n
//! left operands, then all n right operands) to n outputs.

use std::collections::VecDeque;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use itertools::Itertools;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CircuitError {
    #[error("malformed circuit: {0}")]
    Parse(String),
    #[error("circuit is not topologically sortable")]
    NotSortable,
    #[error("gate accessor out of range or wrong gate type")]
    BadAccess,
    #[error("gate type not supported by this evaluator")]
    Unsupported,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum GateKind {
    Xor,
    And,
    Inv,
    Eq,
    Eqw,
    Mand,
}

impl GateKind {
    fn from_token(tok: &str) -> Option<Self> {
        Some(match tok {
            "XOR" => Self::Xor,
            "AND" => Self::And,
            "INV" => Self::Inv,
            "EQ" => Self::Eq,
            "EQW" => Self::Eqw,
            "MAND" => Self::Mand,
            _ => return None,
        })
    }

    fn token(self) -> &'static str {
        match self {
            Self::Xor => "XOR",
            Self::And => "AND",
            Self::Inv => "INV",
            Self::Eq => "EQ",
            Self::Eqw => "EQW",
            Self::Mand => "MAND",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Gate {
    pub kind: GateKind,
    /// Input wire indices; for `EQ` the single entry is the constant 0 or 1.
    pub inputs: Vec<usize>,
    pub outputs: Vec<usize>,
}

pub struct Circuit {
    n_wires: usize,
    input_widths: Vec<usize>,
    output_widths: Vec<usize>,
    gates: Vec<Gate>,
    /// n-th AND gate (MAND excluded) -> gate index, in evaluation order.
    and_map: Vec<usize>,
    total_num_and: usize,
}

fn next_token<'a>(
    tok: &mut impl Iterator<Item = &'a str>,
    what: &str,
) -> Result<&'a str, CircuitError> {
    tok.next()
        .ok_or_else(|| CircuitError::Parse(format!("unexpected end of input reading {what}")))
}

fn next_usize<'a>(
    tok: &mut impl Iterator<Item = &'a str>,
    what: &str,
) -> Result<usize, CircuitError> {
    next_token(tok, what)?
        .parse()
        .map_err(|_| CircuitError::Parse(format!("invalid integer for {what}")))
}

impl FromStr for Circuit {
    type Err = CircuitError;

    fn from_str(s: &str) -> Result<Self, CircuitError> {
        let mut tok = s.split_whitespace();
        let n_gates = next_usize(&mut tok, "gate count")?;
        let n_wires = next_usize(&mut tok, "wire count")?;

        let num_inputs = next_usize(&mut tok, "input count")?;
        let input_widths = (0..num_inputs)
            .map(|_| next_usize(&mut tok, "input width"))
            .collect::<Result<Vec<_>, _>>()?;
        let num_outputs = next_usize(&mut tok, "output count")?;
        let output_widths = (0..num_outputs)
            .map(|_| next_usize(&mut tok, "output width"))
            .collect::<Result<Vec<_>, _>>()?;

        if input_widths.iter().sum::<usize>() + output_widths.iter().sum::<usize>() > n_wires {
            return Err(CircuitError::Parse(
                "more input/output wires than wires".into(),
            ));
        }

        let mut gates = Vec::with_capacity(n_gates);
        for g in 0..n_gates {
            let nin = next_usize(&mut tok, "gate input count")?;
            let nout = next_usize(&mut tok, "gate output count")?;
            let inputs = (0..nin)
                .map(|_| next_usize(&mut tok, "gate input wire"))
                .collect::<Result<Vec<_>, _>>()?;
            let outputs = (0..nout)
                .map(|_| next_usize(&mut tok, "gate output wire"))
                .collect::<Result<Vec<_>, _>>()?;
            let op = next_token(&mut tok, "gate operation")?;
            let kind = GateKind::from_token(op)
                .ok_or_else(|| CircuitError::Parse(format!("unknown gate operation {op:?}")))?;

            let arity_ok = match kind {
                GateKind::Xor | GateKind::And => nin == 2 && nout == 1,
                GateKind::Inv | GateKind::Eq | GateKind::Eqw => nin == 1 && nout == 1,
                GateKind::Mand => nout >= 1 && nin == 2 * nout,
            };
            if !arity_ok {
                return Err(CircuitError::Parse(format!(
                    "gate {g} has {nin} inputs and {nout} outputs for {op}"
                )));
            }
            let wire_inputs_ok = match kind {
                // The EQ "input" is the constant to assign.
                GateKind::Eq => inputs[0] <= 1,
                _ => inputs.iter().all(|&w| w < n_wires),
            };
            if !wire_inputs_ok || outputs.iter().any(|&w| w >= n_wires) {
                return Err(CircuitError::Parse(format!("gate {g} references a bad wire")));
            }
            gates.push(Gate {
                kind,
                inputs,
                outputs,
            });
        }
        if tok.next().is_some() {
            return Err(CircuitError::Parse("trailing data after last gate".into()));
        }

        let mut circuit = Self {
            n_wires,
            input_widths,
            output_widths,
            gates,
            and_map: Vec::new(),
            total_num_and: 0,
        };
        circuit.recompute_map();
        Ok(circuit)
    }
}

impl Circuit {
    pub fn num_gates(&self) -> usize {
        self.gates.len()
    }

    pub fn num_wires(&self) -> usize {
        self.n_wires
    }

    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    /// Number of plain AND gates (MAND excluded).
    pub fn num_and_gates(&self) -> usize {
        self.and_map.len()
    }

    /// Number of AND operations including those inside MAND gates.
    pub fn total_num_and_gates(&self) -> usize {
        self.total_num_and
    }

    pub fn num_inputs(&self) -> usize {
        self.input_widths.len()
    }

    pub fn num_outputs(&self) -> usize {
        self.output_widths.len()
    }

    pub fn num_input_wires(&self, i: usize) -> usize {
        self.input_widths[i]
    }

    pub fn num_output_wires(&self, i: usize) -> usize {
        self.output_widths[i]
    }

    pub fn gate_kind(&self, i: usize) -> Result<GateKind, CircuitError> {
        Ok(self.gates.get(i).ok_or(CircuitError::BadAccess)?.kind)
    }

    pub fn gate_wire_in(&self, i: usize, j: usize) -> Result<usize, CircuitError> {
        let gate = self.gates.get(i).ok_or(CircuitError::BadAccess)?;
        if gate.kind == GateKind::Eq || j >= gate.inputs.len() {
            return Err(CircuitError::BadAccess);
        }
        Ok(gate.inputs[j])
    }

    pub fn gate_wire_out(&self, i: usize) -> Result<usize, CircuitError> {
        let gate = self.gates.get(i).ok_or(CircuitError::BadAccess)?;
        if gate.kind == GateKind::Mand {
            return Err(CircuitError::BadAccess);
        }
        Ok(gate.outputs[0])
    }

    pub fn mand_gate_size(&self, i: usize) -> Result<usize, CircuitError> {
        let gate = self.gates.get(i).ok_or(CircuitError::BadAccess)?;
        if gate.kind != GateKind::Mand {
            return Err(CircuitError::BadAccess);
        }
        Ok(gate.outputs.len())
    }

    /// Gate index of the n-th plain AND gate in evaluation order.
    pub fn nth_and_gate(&self, n: usize) -> Result<usize, CircuitError> {
        self.and_map.get(n).copied().ok_or(CircuitError::BadAccess)
    }

    fn recompute_map(&mut self) {
        self.and_map = self
            .gates
            .iter()
            .positions(|g| g.kind == GateKind::And)
            .collect();
        self.total_num_and = self.and_map.len()
            + self
                .gates
                .iter()
                .filter(|g| g.kind == GateKind::Mand)
                .map(|g| g.outputs.len())
                .sum::<usize>();
    }

    fn num_declared_input_wires(&self) -> usize {
        self.input_widths.iter().sum()
    }

    /// Reorders the gates topologically: a gate is emitted once all of its
    /// input wires are produced (or are declared circuit inputs). Fails when
    /// no such order exists, or when a wire has two producers.
    pub fn sort(&mut self) -> Result<(), CircuitError> {
        let mut used = vec![false; self.n_wires];
        for w in used.iter_mut().take(self.num_declared_input_wires()) {
            *w = true;
        }

        let mut consumers: Vec<Vec<usize>> = vec![Vec::new(); self.n_wires];
        let mut missing = vec![0usize; self.gates.len()];
        for (i, gate) in self.gates.iter().enumerate() {
            if gate.kind == GateKind::Eq {
                continue;
            }
            for &w in &gate.inputs {
                if !used[w] {
                    consumers[w].push(i);
                    missing[i] += 1;
                }
            }
        }

        let mut queue: VecDeque<usize> = missing.iter().positions(|&m| m == 0).collect();
        let mut order = Vec::with_capacity(self.gates.len());
        while let Some(i) = queue.pop_front() {
            order.push(i);
            for &w in &self.gates[i].outputs {
                if used[w] {
                    // A declared input or an earlier gate already drives it.
                    return Err(CircuitError::NotSortable);
                }
                used[w] = true;
                for &consumer in &consumers[w] {
                    missing[consumer] -= 1;
                    if missing[consumer] == 0 {
                        queue.push_back(consumer);
                    }
                }
            }
        }
        if order.len() != self.gates.len() {
            return Err(CircuitError::NotSortable);
        }

        let mut reordered = Vec::with_capacity(self.gates.len());
        for i in order {
            reordered.push(self.gates[i].clone());
        }
        self.gates = reordered;
        self.recompute_map();
        Ok(())
    }

    /// AND-depth of every gate: the number of AND/MAND levels on the longest
    /// path from the inputs through the gate, inclusive. Assumes the circuit
    /// is topologically sorted.
    pub fn compute_depth(&self) -> Vec<usize> {
        let mut wire_depth = vec![0usize; self.n_wires];
        let mut gate_depth = vec![0usize; self.gates.len()];
        for (i, gate) in self.gates.iter().enumerate() {
            let d_in = match gate.kind {
                GateKind::Eq => 0,
                _ => gate.inputs.iter().map(|&w| wire_depth[w]).max().unwrap_or(0),
            };
            let d = d_in + matches!(gate.kind, GateKind::And | GateKind::Mand) as usize;
            gate_depth[i] = d;
            for &w in &gate.outputs {
                wire_depth[w] = d;
            }
        }
        gate_depth
    }

    /// Fuses groups of two or more equal-depth AND/MAND gates into single
    /// MAND gates. Equal depth implies independence, so the fused gate is
    /// well-formed; the circuit is re-sorted afterwards. Assumes the circuit
    /// is topologically sorted.
    pub fn merge_and_gates(&mut self) -> Result<(), CircuitError> {
        let depths = self.compute_depth();
        let mut groups: Vec<(usize, Vec<usize>)> = Vec::new();
        for (i, gate) in self.gates.iter().enumerate() {
            if !matches!(gate.kind, GateKind::And | GateKind::Mand) {
                continue;
            }
            match groups.iter_mut().find(|(d, _)| *d == depths[i]) {
                Some((_, members)) => members.push(i),
                None => groups.push((depths[i], vec![i])),
            }
        }

        let mut absorbed = vec![false; self.gates.len()];
        let mut merged = Vec::new();
        for (_, members) in &groups {
            if members.len() < 2 {
                continue;
            }
            let mut lhs = Vec::new();
            let mut rhs = Vec::new();
            let mut outputs = Vec::new();
            for &i in members {
                absorbed[i] = true;
                let gate = &self.gates[i];
                let n = gate.inputs.len() / 2;
                lhs.extend_from_slice(&gate.inputs[..n]);
                rhs.extend_from_slice(&gate.inputs[n..]);
                outputs.extend_from_slice(&gate.outputs);
            }
            lhs.extend(rhs);
            merged.push(Gate {
                kind: GateKind::Mand,
                inputs: lhs,
                outputs,
            });
        }
        if merged.is_empty() {
            return Ok(());
        }

        let mut gates = Vec::with_capacity(self.gates.len());
        for (i, gate) in self.gates.iter().enumerate() {
            if !absorbed[i] {
                gates.push(gate.clone());
            }
        }
        gates.extend(merged);
        self.gates = gates;
        self.sort()
    }

    /// Evaluates the circuit over an arbitrary value type, given the three
    /// gate operations. Only XOR/AND/INV circuits are supported here; the
    /// proof protocols never see the other kinds. Returns the value on the
    /// final wire.
    pub fn eval_custom<T, FX, FA, FI>(
        &self,
        inputs: &[T],
        mut f_xor: FX,
        mut f_and: FA,
        mut f_inv: FI,
    ) -> anyhow::Result<T>
    where
        T: Clone + Default,
        FX: FnMut(&T, &T) -> anyhow::Result<T>,
        FA: FnMut(&T, &T) -> anyhow::Result<T>,
        FI: FnMut(&T) -> anyhow::Result<T>,
    {
        let mut wires = vec![T::default(); self.n_wires];
        wires[..inputs.len()].clone_from_slice(inputs);
        for gate in &self.gates {
            let value = match gate.kind {
                GateKind::Xor => f_xor(&wires[gate.inputs[0]], &wires[gate.inputs[1]])?,
                GateKind::And => f_and(&wires[gate.inputs[0]], &wires[gate.inputs[1]])?,
                GateKind::Inv => f_inv(&wires[gate.inputs[0]])?,
                _ => return Err(CircuitError::Unsupported.into()),
            };
            wires[gate.outputs[0]] = value;
        }
        Ok(wires.last().cloned().expect("circuit has at least one wire"))
    }

    /// Plain Boolean evaluation supporting every gate kind; for testing
    /// circuits. Inputs and outputs are per declared variable.
    pub fn evaluate(&self, inputs: &[Vec<bool>]) -> Result<Vec<Vec<bool>>, CircuitError> {
        if inputs.len() != self.input_widths.len()
            || inputs
                .iter()
                .zip(&self.input_widths)
                .any(|(i, &w)| i.len() != w)
        {
            return Err(CircuitError::BadAccess);
        }
        let mut wires = vec![false; self.n_wires];
        for (w, bit) in wires.iter_mut().zip(inputs.iter().flatten()) {
            *w = *bit;
        }
        for gate in &self.gates {
            match gate.kind {
                GateKind::Xor => {
                    wires[gate.outputs[0]] = wires[gate.inputs[0]] ^ wires[gate.inputs[1]]
                }
                GateKind::And => {
                    wires[gate.outputs[0]] = wires[gate.inputs[0]] & wires[gate.inputs[1]]
                }
                GateKind::Inv => wires[gate.outputs[0]] = !wires[gate.inputs[0]],
                GateKind::Eq => wires[gate.outputs[0]] = gate.inputs[0] == 1,
                GateKind::Eqw => wires[gate.outputs[0]] = wires[gate.inputs[0]],
                GateKind::Mand => {
                    let n = gate.outputs.len();
                    for j in 0..n {
                        wires[gate.outputs[j]] = wires[gate.inputs[j]] & wires[gate.inputs[n + j]];
                    }
                }
            }
        }

        let first_output_wire = self.n_wires - self.output_widths.iter().sum::<usize>();
        let mut outputs = Vec::with_capacity(self.output_widths.len());
        let mut at = first_output_wire;
        for &width in &self.output_widths {
            outputs.push(wires[at..at + width].to_vec());
            at += width;
        }
        Ok(outputs)
    }
}

impl Display for Circuit {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}", self.gates.len(), self.n_wires)?;
        write!(f, "{}", self.input_widths.len())?;
        for w in &self.input_widths {
            write!(f, " {w}")?;
        }
        writeln!(f)?;
        write!(f, "{}", self.output_widths.len())?;
        for w in &self.output_widths {
            write!(f, " {w}")?;
        }
        writeln!(f)?;
        writeln!(f)?;
        for gate in &self.gates {
            write!(f, "{} {}", gate.inputs.len(), gate.outputs.len())?;
            for w in &gate.inputs {
                write!(f, " {w}")?;
            }
            for w in &gate.outputs {
                write!(f, " {w}")?;
            }
            writeln!(f, " {}", gate.kind.token())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// out = !(a & b & c), one bit per input.
    const TRIPLE_AND: &str = "\
3 6
3 1 1 1
1 1

2 1 0 1 3 AND
2 1 3 2 4 AND
1 1 4 5 INV
";

    #[test]
    fn parse_and_evaluate() {
        let circ: Circuit = TRIPLE_AND.parse().unwrap();
        assert_eq!(circ.num_gates(), 3);
        assert_eq!(circ.num_wires(), 6);
        assert_eq!(circ.num_and_gates(), 2);
        assert_eq!(circ.total_num_and_gates(), 2);
        assert_eq!(circ.nth_and_gate(0).unwrap(), 0);
        assert_eq!(circ.nth_and_gate(1).unwrap(), 1);

        for bits in 0..8u8 {
            let inputs: Vec<Vec<bool>> = (0..3).map(|i| vec![(bits >> i) & 1 == 1]).collect();
            let out = circ.evaluate(&inputs).unwrap();
            assert_eq!(out, vec![vec![bits != 7]]);
        }
    }

    #[test]
    fn sort_reorders_shuffled_gates() {
        // Same circuit with the INV listed before its input is produced.
        let shuffled = "\
3 6
3 1 1 1
1 1

1 1 4 5 INV
2 1 3 2 4 AND
2 1 0 1 3 AND
";
        let mut circ: Circuit = shuffled.parse().unwrap();
        circ.sort().unwrap();
        assert_eq!(circ.gates()[0].kind, GateKind::And);
        assert_eq!(circ.gates()[2].kind, GateKind::Inv);
        let out = circ
            .evaluate(&[vec![true], vec![true], vec![true]])
            .unwrap();
        assert_eq!(out, vec![vec![false]]);
    }

    #[test]
    fn unsortable_cycle_is_rejected() {
        let cyclic = "\
2 4
2 1 1
1 1

2 1 0 3 2 XOR
2 1 1 2 3 XOR
";
        let mut circ: Circuit = cyclic.parse().unwrap();
        assert!(matches!(circ.sort(), Err(CircuitError::NotSortable)));
    }

    #[test]
    fn eq_eqw_and_mand_gates() {
        // w2 = 1, w3 = w0, (w4, w5) = (w0 & w1, w3 & w2), out w6 = w4 ^ w5.
        let text = "\
4 7
2 1 1
1 1

1 1 1 2 EQ
1 1 0 3 EQW
4 2 0 3 1 2 4 5 MAND
2 1 4 5 6 XOR
";
        let circ: Circuit = text.parse().unwrap();
        assert_eq!(circ.total_num_and_gates(), 2);
        assert_eq!(circ.num_and_gates(), 0);
        for bits in 0..4u8 {
            let a = bits & 1 == 1;
            let b = bits >> 1 == 1;
            let out = circ.evaluate(&[vec![a], vec![b]]).unwrap();
            assert_eq!(out[0][0], (a & b) ^ a);
        }
    }

    #[test]
    fn merge_fuses_equal_depth_ands() {
        // Two independent ANDs at depth 1 feeding an XOR.
        let text = "\
3 7
4 1 1 1 1
1 1

2 1 0 1 4 AND
2 1 2 3 5 AND
2 1 4 5 6 XOR
";
        let mut circ: Circuit = text.parse().unwrap();
        circ.sort().unwrap();
        let before: Vec<_> = (0..16u8)
            .map(|bits| {
                let inputs: Vec<Vec<bool>> =
                    (0..4).map(|i| vec![(bits >> i) & 1 == 1]).collect();
                circ.evaluate(&inputs).unwrap()
            })
            .collect();

        circ.merge_and_gates().unwrap();
        assert_eq!(circ.num_and_gates(), 0);
        assert_eq!(circ.total_num_and_gates(), 2);
        assert_eq!(circ.num_gates(), 2);

        for (bits, expected) in before.iter().enumerate() {
            let inputs: Vec<Vec<bool>> =
                (0..4).map(|i| vec![(bits >> i) & 1 == 1]).collect();
            assert_eq!(&circ.evaluate(&inputs).unwrap(), expected);
        }
    }

    #[test]
    fn depth_counts_and_levels() {
        let circ: Circuit = TRIPLE_AND.parse().unwrap();
        assert_eq!(circ.compute_depth(), vec![1, 2, 2]);
    }

    #[test]
    fn eval_custom_matches_boolean_evaluation() {
        let circ: Circuit = TRIPLE_AND.parse().unwrap();
        let inputs = [true, true, false];
        let out = circ
            .eval_custom(
                &inputs,
                |a, b| Ok(a ^ b),
                |a, b| Ok(a & b),
                |a| Ok(!a),
            )
            .unwrap();
        assert!(out);
    }

    #[test]
    fn accessor_bounds() {
        let circ: Circuit = TRIPLE_AND.parse().unwrap();
        assert_eq!(circ.gate_wire_in(0, 1).unwrap(), 1);
        assert_eq!(circ.gate_wire_out(2).unwrap(), 5);
        assert!(circ.gate_wire_in(3, 0).is_err());
        assert!(circ.gate_wire_in(2, 1).is_err());
        assert!(circ.mand_gate_size(0).is_err());
    }

    #[test]
    fn display_round_trips() {
        let circ: Circuit = TRIPLE_AND.parse().unwrap();
        let reparsed: Circuit = circ.to_string().parse().unwrap();
        assert_eq!(reparsed.num_gates(), circ.num_gates());
        assert_eq!(
            reparsed.evaluate(&[vec![true], vec![true], vec![false]]).unwrap(),
            circ.evaluate(&[vec![true], vec![true], vec![false]]).unwrap()
        );
    }

    #[test]
    fn bad_wire_index_is_a_parse_error() {
        let text = "\
1 3
2 1 1
1 1

2 1 0 9 2 XOR
";
        assert!(matches!(
            text.parse::<Circuit>(),
            Err(CircuitError::Parse(_))
        ));
    }
}
