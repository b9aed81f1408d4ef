use std::fmt::{self, Debug, Display};

use crate::Layer;

/// Renders a layer as `a_k = phi([W] a_{k-1} + [b])`, one row of `W` per line.
pub struct PrettyPrintLayer<'a> {
    i_layer: usize,
    layer: &'a Layer,
}

impl<'a> PrettyPrintLayer<'a> {
    pub fn new(i_layer: usize, layer: &'a Layer) -> Self {
        Self { i_layer, layer }
    }
}

impl Debug for PrettyPrintLayer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Display::fmt(self, f)
    }
}

fn write_element(f: &mut fmt::Formatter, element: f32) -> fmt::Result {
    // Pad positives so that columns line up with negatives.
    if element.is_sign_positive() {
        write!(f, " {element:.4?}")
    } else {
        write!(f, "{element:.4?}")
    }
}

impl Display for PrettyPrintLayer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let w = self.layer.weights();
        let b = self.layer.bias();
        let n = self.layer.n_outputs();
        let center_line = n / 2;
        let i_layer = self.i_layer;
        let lhs = format!("a_{i_layer} = {}(", self.layer.phi().name());
        let rhs = match i_layer.checked_sub(1) {
            None => " x + ".to_owned(),
            Some(i_previous) => format!(" a_{i_previous} + "),
        };
        for i_line in 0..n {
            let is_center = i_line == center_line;
            match is_center {
                true => f.write_str(&lhs)?,
                false => write!(f, "{:width$}", "", width = lhs.len())?,
            }
            write!(f, "[")?;
            for (i, &element) in w.row(i_line).iter().enumerate() {
                if i != 0 {
                    write!(f, " ")?;
                }
                write_element(f, element)?;
            }
            write!(f, "]")?;
            match is_center {
                true => f.write_str(&rhs)?,
                false => write!(f, "{:width$}", "", width = rhs.len())?,
            }
            write!(f, "[")?;
            write_element(f, b[i_line])?;
            write!(f, "]")?;
            if is_center {
                write!(f, ")")?;
            }
            if i_line + 1 != n {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
