//! [libs/core/layout/src/lib.rs]
//!
//! Deterministic geometry for the IPv4 node tree.
//!
//! A node's (x, y, radius) is a pure function of its own address and its
//! parent's already-computed geometry — there is no global layout pass, no
//! randomness, and no I/O. The Node Materialiser in `flowmap-domain-pipeline`
//! walks the tree root-first and feeds each level's geometry forward; this
//! crate only supplies the arithmetic the formulas below are normative.

use flowmap_core_addr::Subnet;

/// A node's placement on the visualisation plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
}

/// The /8 plane is a fixed 16x16 grid; every /8 node's geometry is derived
/// from its own `ip8` octet alone, with no parent.
pub fn root_geometry(ipstart: u32) -> Geometry {
    let ip8 = (ipstart >> 24) & 0xFF;
    let x = 331_776.0 * (ip8 % 16) as f64 / 7.5 - 331_776.0;
    let y = 331_776.0 * (ip8 / 16) as f64 / 7.5 - 331_776.0;
    Geometry { x, y, radius: 20_736.0 }
}

/// Places a /16, /24, or /32 node inside its parent's cell. `ipstart` is the
/// full 32-bit address of the child range; `subnet` is the child's level.
/// Panics if called with [`Subnet::Eight`], which has no parent.
pub fn child_geometry(parent: &Geometry, ipstart: u32, subnet: Subnet) -> Geometry {
    let shift = 32 - subnet.mask_len();
    let k = (ipstart >> shift) % 256;
    let kx = k % 16;
    let ky = k / 16;

    Geometry {
        x: parent.x + parent.radius * (kx as f64 / 7.5 - 1.0),
        y: parent.y + parent.radius * (ky as f64 / 7.5 - 1.0),
        radius: parent.radius / 24.0,
    }
}

/// Dispatches to [`root_geometry`] or [`child_geometry`] depending on level.
/// `parent` must be `Some` for every level but [`Subnet::Eight`].
pub fn geometry_for(subnet: Subnet, ipstart: u32, parent: Option<&Geometry>) -> Geometry {
    match (subnet, parent) {
        (Subnet::Eight, _) => root_geometry(ipstart),
        (_, Some(parent_geometry)) => child_geometry(parent_geometry, ipstart, subnet),
        (_, None) => panic!("geometry_for: subnet {:?} requires a parent geometry", subnet),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn root_grid_corners() {
        let top_left = root_geometry(0);
        assert_eq!(top_left.x, -331_776.0);
        assert_eq!(top_left.y, -331_776.0);
        assert_eq!(top_left.radius, 20_736.0);

        let last_octet = root_geometry(255u32 << 24);
        // ip8 = 255 -> kx = 255 % 16 = 15, ky = 255 / 16 = 15
        assert_eq!(last_octet.x, 331_776.0 * 15.0 / 7.5 - 331_776.0);
        assert_eq!(last_octet.y, 331_776.0 * 15.0 / 7.5 - 331_776.0);
    }

    #[test]
    fn child_radius_shrinks_by_24_per_level() {
        let root = root_geometry(10u32 << 24);
        let l16 = child_geometry(&root, 10u32 << 24, Subnet::Sixteen);
        let l24 = child_geometry(&l16, 10u32 << 24, Subnet::TwentyFour);
        let l32 = child_geometry(&l24, 10u32 << 24, Subnet::ThirtyTwo);
        assert_eq!(l16.radius, root.radius / 24.0);
        assert_eq!(l24.radius, l16.radius / 24.0);
        assert_eq!(l32.radius, l24.radius / 24.0);
    }

    proptest! {
        // P3 (layout half): identical inputs always yield identical geometry.
        #[test]
        fn p3_layout_is_deterministic(ipstart: u32) {
            let a = root_geometry(ipstart);
            let b = root_geometry(ipstart);
            prop_assert_eq!(a, b);

            let child_a = child_geometry(&a, ipstart, Subnet::Sixteen);
            let child_b = child_geometry(&a, ipstart, Subnet::Sixteen);
            prop_assert_eq!(child_a, child_b);
        }
    }
}
