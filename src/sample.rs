/// One accelerometer reading in milli-G, before it has a timestamp
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct Axes {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

impl Axes {
    pub fn new(x: i16, y: i16, z: i16) -> Self {
        Self { x, y, z }
    }

    pub fn magnitude(&self) -> f64 {
        let (x, y, z) = (self.x as f64, self.y as f64, self.z as f64);
        (x * x + y * y + z * z).sqrt()
    }
}

/// A reading with its (POSIX ms) timestamp assigned
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct Sample {
    pub x: i16,
    pub y: i16,
    pub z: i16,
    pub timestamp_ms: i64,
}

impl Sample {
    pub fn new(axes: Axes, timestamp_ms: i64) -> Self {
        Self {
            x: axes.x,
            y: axes.y,
            z: axes.z,
            timestamp_ms,
        }
    }

    pub fn axes(&self) -> Axes {
        Axes::new(self.x, self.y, self.z)
    }
}
