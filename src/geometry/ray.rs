use ultraviolet::Vec3;

/// Nearest-hit record written by the accelerator.
#[derive(Clone, Debug, Copy, PartialEq)]
pub struct RayHit {
    pub geom_id: u32,
    pub prim_id: u32,
    pub t: f32,
    pub normal: Vec3,
}

#[derive(Clone, Debug, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3, // normalized
    pub t_near: f32,
    pub t_far: f32,
    pub time: f32,
    pub depth: u32,
    pub hit: Option<RayHit>,
}

impl Ray {
    #[inline]
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalized(),
            t_near: 0.0,
            t_far: f32::INFINITY,
            time: 0.0,
            depth: 0,
            hit: None,
        }
    }

    #[inline]
    pub fn with_interval(mut self, t_near: f32, t_far: f32) -> Self {
        self.t_near = t_near;
        self.t_far = t_far;
        self
    }

    #[inline]
    pub fn with_time(mut self, time: f32) -> Self {
        self.time = time;
        self
    }

    #[inline]
    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    #[inline(always)]
    pub fn at(&self, t: f32) -> Vec3 {
        self.direction.mul_add(Vec3::broadcast(t), self.origin)
    }

    #[inline(always)]
    pub fn is_hit(&self) -> bool {
        self.hit.is_some()
    }

    /// Distance to the nearest hit, or the far end of the interval on a miss.
    #[inline(always)]
    pub fn hit_distance(&self) -> f32 {
        self.hit.map_or(self.t_far, |hit| hit.t)
    }

    /// Records `t` as the nearest hit if it lies inside the open interval and is closer.
    #[inline]
    pub(crate) fn try_commit(&mut self, t: f32, geom_id: u32, prim_id: u32, normal: Vec3) -> bool {
        if t <= self.t_near || t >= self.hit_distance() {
            return false;
        }
        self.hit = Some(RayHit {
            geom_id,
            prim_id,
            t,
            normal,
        });
        true
    }
}
