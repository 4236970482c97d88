use crate::units::*;

/// Coordinate columns of a generated particle layout.
#[derive(Clone, Debug, Default)]
pub struct Layout {
    pub x: Vec<Real>,
    pub y: Vec<Real>,
}

impl Layout {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn translate(&mut self, offset: Vector) {
        self.x.iter_mut().for_each(|x| *x += offset.x);
        self.y.iter_mut().for_each(|y| *y += offset.y);
    }
}

/// Open tank made of `num_layers` particle layers on a lattice with spacing `spacing`.
///
/// The innermost layer runs along y=0 and x=±length/2, additional layers are stacked outside.
/// Walls are as high as `height` plus the outer layers, there is no lid.
pub fn tank_2d(spacing: Real, length: Real, height: Real, num_layers: usize) -> Layout {
    // Work on integer lattice coordinates so the walls don't drift with accumulated float error.
    let num_x = (length / spacing).round() as i64;
    let num_y = (height / spacing).round() as i64;
    let outer = num_layers.max(1) as i64 - 1;

    let mut layout = Layout::default();
    for ix in -outer..=num_x + outer {
        for iy in -outer..=num_y + outer {
            let is_wall = ix <= 0 || ix >= num_x || iy <= 0;
            if !is_wall {
                continue;
            }
            layout.x.push(ix as Real * spacing - length * 0.5);
            layout.y.push(iy as Real * spacing);
        }
    }
    layout
}

/// Rectangular block of particles centered at `center`.
///
/// Particles are placed on both edges, so the spacing along each axis is slightly adjusted to fit the block size.
pub fn block_2d(spacing: Real, length: Real, height: Real, center: Point) -> Layout {
    let num_x = (length / spacing) as usize + 1;
    let num_y = (height / spacing) as usize + 1;
    let step_x = if num_x > 1 { length / (num_x - 1) as Real } else { 0.0 };
    let step_y = if num_y > 1 { height / (num_y - 1) as Real } else { 0.0 };

    let mut layout = Layout {
        x: Vec::with_capacity(num_x * num_y),
        y: Vec::with_capacity(num_x * num_y),
    };
    for ix in 0..num_x {
        for iy in 0..num_y {
            layout.x.push(center.x - length * 0.5 + ix as Real * step_x);
            layout.y.push(center.y - height * 0.5 + iy as Real * step_y);
        }
    }
    layout
}
