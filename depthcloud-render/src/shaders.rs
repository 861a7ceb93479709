//! Shader sources embedded at compile time.

/// Depth unprojection vertex stage and particle fragment stage.
pub const UNPROJECT: &str = include_str!("../shaders/unproject.wgsl");

pub const UNPROJECT_VERTEX: &str = "unproject_vertex";

pub const PARTICLE_FRAGMENT: &str = "particle_fragment";

#[cfg(test)]
mod tests {
    use super::*;
    use depthcloud_gpu::shader::parse_entry_points;

    #[test]
    fn test_entry_points_declared() {
        let names: Vec<String> = parse_entry_points("unproject", UNPROJECT)
            .expect("unproject.wgsl parses")
            .into_iter()
            .map(|entry| entry.name)
            .collect();
        assert_eq!(names, vec![UNPROJECT_VERTEX, PARTICLE_FRAGMENT]);
    }

    #[test]
    fn test_unproject_validates() {
        let module = naga::front::wgsl::parse_str(UNPROJECT).expect("unproject.wgsl parses");
        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::empty(),
        )
        .validate(&module)
        .expect("unproject.wgsl validates");
    }
}
