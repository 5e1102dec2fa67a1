// mesh.rs — 球体 / 立方体网格生成
//
// UV 约定：v = 0 在纹理顶部（wgpu 纹理坐标）。

use glam::Vec3;
use std::f32::consts::PI;

pub const SPHERE_WIDTH_SEGMENTS: usize = 60;
pub const SPHERE_HEIGHT_SEGMENTS: usize = 40;

/// 一段使用同一材质的索引区间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawGroup {
    pub start: u32,
    pub count: u32,
    pub material: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub positions: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
    pub groups: Vec<DrawGroup>,
}

impl Mesh {
    pub fn bounding_box(&self) -> (Vec3, Vec3) {
        self.positions.iter().fold(
            (Vec3::splat(f32::INFINITY), Vec3::splat(f32::NEG_INFINITY)),
            |(lo, hi), p| {
                let p = Vec3::from_array(*p);
                (lo.min(p), hi.max(p))
            },
        )
    }

    pub fn size(&self) -> Vec3 {
        let (lo, hi) = self.bounding_box();
        hi - lo
    }

    /// 某个材质组用到的所有顶点
    #[cfg(test)]
    pub fn group_vertices(&self, material: usize) -> Vec<[f32; 3]> {
        self.groups
            .iter()
            .filter(|g| g.material == material)
            .flat_map(|g| &self.indices[g.start as usize..(g.start + g.count) as usize])
            .map(|&i| self.positions[i as usize])
            .collect()
    }
}

/// 竖直方向的覆盖范围（从 +Y 极点起算）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerticalArc {
    pub start: f32,
    pub length: f32,
}

impl VerticalArc {
    pub const FULL: VerticalArc = VerticalArc { start: 0.0, length: PI };
}

/// 经纬球。x 轴镜像，三角形朝向球心，纹理从内部看是正的。
pub fn build_sphere(radius: f32, lon: usize, lat: usize, arc: VerticalArc) -> Mesh {
    let mut positions = Vec::with_capacity((lat + 1) * (lon + 1));
    let mut uvs = Vec::with_capacity((lat + 1) * (lon + 1));
    let mut indices = Vec::new();

    let theta_end = (arc.start + arc.length).min(PI);

    for i in 0..=lat {
        let v = i as f32 / lat as f32;
        let theta = arc.start + v * arc.length;
        let y = radius * theta.cos();
        let sin_t = theta.sin();

        for j in 0..=lon {
            let u = j as f32 / lon as f32;
            let phi = 2.0 * PI * u;

            let x = radius * phi.cos() * sin_t;
            let z = radius * phi.sin() * sin_t;

            positions.push([x, y, z]);
            uvs.push([u, v]);
        }
    }

    let row = lon + 1;
    for i in 0..lat {
        for j in 0..lon {
            let a = (i * row + j + 1) as u32;
            let b = (i * row + j) as u32;
            let c = ((i + 1) * row + j) as u32;
            let d = ((i + 1) * row + j + 1) as u32;

            // 极点处的退化三角形跳过
            if i != 0 || arc.start > 0.0 {
                indices.extend_from_slice(&[a, b, d]);
            }
            if i != lat - 1 || theta_end < PI {
                indices.extend_from_slice(&[b, c, d]);
            }
        }
    }

    let count = indices.len() as u32;
    Mesh {
        positions,
        uvs,
        indices,
        groups: vec![DrawGroup { start: 0, count, material: 0 }],
    }
}

/// 单位分段的长方体，六组材质按 +X, -X, +Y, -Y, +Z, -Z 排列，三角形朝外。
/// `mirror_u` 把每个面的水平纹理坐标翻转，用于从盒子内部观看。
pub fn build_box(width: f32, height: f32, depth: f32, mirror_u: bool) -> Mesh {
    let mut mesh = Mesh::default();
    // (u 轴, v 轴, 法向轴, u 方向, v 方向, 面宽, 面高, 法向偏移)
    let planes: [(usize, usize, usize, f32, f32, f32, f32, f32); 6] = [
        (2, 1, 0, -1.0, -1.0, depth, height, width),
        (2, 1, 0, 1.0, -1.0, depth, height, -width),
        (0, 2, 1, 1.0, 1.0, width, depth, height),
        (0, 2, 1, 1.0, -1.0, width, depth, -height),
        (0, 1, 2, 1.0, -1.0, width, height, depth),
        (0, 1, 2, -1.0, -1.0, width, height, -depth),
    ];

    for (material, &(u, v, w, udir, vdir, pw, ph, pd)) in planes.iter().enumerate() {
        let base = mesh.positions.len() as u32;
        let start = mesh.indices.len() as u32;

        for iy in 0..=1 {
            let y = iy as f32 * ph - ph / 2.0;
            for ix in 0..=1 {
                let x = ix as f32 * pw - pw / 2.0;
                let mut p = [0.0f32; 3];
                p[u] = x * udir;
                p[v] = y * vdir;
                p[w] = pd / 2.0;
                mesh.positions.push(p);

                let tu = ix as f32;
                mesh.uvs.push([if mirror_u { 1.0 - tu } else { tu }, iy as f32]);
            }
        }

        let (a, b, c, d) = (base, base + 2, base + 3, base + 1);
        mesh.indices.extend_from_slice(&[a, b, d, b, c, d]);
        mesh.groups.push(DrawGroup { start, count: 6, material });
    }

    mesh
}
