//! 端到端场景：只经由公开 API 调用

use proptest::prelude::*;
use structura::{
    is_trajectory_filename, parse_structure, parse_trajectory, trajectory_stats,
    validate_trajectory, FormatKind, FrameIndex, StructuraError,
};

#[test]
fn test_two_frame_xyz_trajectory() {
    let content = "3\nframe1\nH 0 0 0\nH 1 0 0\nH 0 1 0\n3\nframe2\nH .1 0 0\nH 1.1 0 0\nH .1 1 0";
    let trajectory = parse_trajectory(content, "sample.xyz").unwrap();

    assert_eq!(trajectory.frames.len(), 2);
    assert!(trajectory.frames.iter().all(|f| f.structure.sites.len() == 3));
    assert!((trajectory.frames[1].structure.sites[0].xyz[0] - 0.1).abs() < 1e-12);
    assert_eq!(trajectory.metadata.source_format.as_deref(), Some("xyz"));
}

#[test]
fn test_poscar_negative_scale() {
    let content = "target volume\n-10.0\n2 0 0\n0 2 0\n0 0 2\nH\n1\nDirect\n0 0 0\n";
    let structure = parse_structure(content, Some("POSCAR")).unwrap();
    let lattice = structure.lattice.unwrap();
    let s = (10.0f64 / 8.0).cbrt();

    for i in 0..3 {
        assert!((lattice.matrix[i][i] - 2.0 * s).abs() < 1e-9);
    }
    assert!((lattice.volume - 10.0).abs() < 1e-9);
}

#[test]
fn test_cif_disorder_group_two_excluded() {
    let content = "data_test
_cell_length_a 8
_cell_length_b 8
_cell_length_c 8
_cell_angle_alpha 90
_cell_angle_beta 90
_cell_angle_gamma 90
loop_
_atom_site_label
_atom_site_type_symbol
_atom_site_fract_x
_atom_site_fract_y
_atom_site_fract_z
_atom_site_disorder_group
N1 N 0.10 0.10 0.10 .
O1 O 0.20 0.20 0.20 1
O2 O 0.25 0.25 0.25 2
";
    let structure = parse_structure(content, Some("disorder.cif")).unwrap();
    let labels: Vec<&str> = structure.sites.iter().map(|s| s.label.as_str()).collect();
    assert_eq!(labels, vec!["N1", "O1"]);
}

#[test]
fn test_lammps_triclinic_box() {
    let content = "ITEM: TIMESTEP
100
ITEM: NUMBER OF ATOMS
2
ITEM: BOX BOUNDS xy xz yz pp pp pp
0 10 2.0
0 10 1.0
0 10 0.5
ITEM: ATOMS id type x y z
1 1 0.0 0.0 0.0
2 2 1.0 1.0 1.0
";
    let trajectory = parse_trajectory(content, "dump.lammpstrj").unwrap();
    let frame = &trajectory.frames[0];
    let lattice = frame.structure.lattice.as_ref().unwrap();

    assert_eq!(frame.step, 100.0);
    assert_eq!(lattice.matrix[1][0], 2.0);
    assert_eq!(lattice.matrix[2][0], 1.0);
    assert_eq!(lattice.matrix[2][1], 0.5);
    assert!((lattice.volume - 665.0).abs() < 1e-6);
}

#[test]
fn test_trajectory_filename_heuristics() {
    assert!(!is_trajectory_filename("mp-1184225.extxyz"));
    assert!(is_trajectory_filename("relax-simulation.xyz"));
    assert!(is_trajectory_filename("XDATCAR"));
    assert!(is_trajectory_filename("run.traj"));
    assert_eq!(
        structura::detect_format("mp-1184225.extxyz", None),
        Some(FormatKind::Xyz)
    );
}

#[test]
fn test_validator_reports_every_defect() {
    let mut trajectory = parse_trajectory("1\n\nAr 0 0 0\n", "single.xyz").unwrap();
    trajectory.is_indexed = true;
    trajectory.total_frames = Some(-1);
    trajectory.indexed_frames = vec![FrameIndex {
        frame_number: 3,
        byte_offset: 0,
        estimated_size: 12,
    }];

    let errors = validate_trajectory(&trajectory);
    assert_eq!(errors.len(), 2);
    assert!(errors[0].contains("total_frames"));
    assert!(errors[1].contains("frame_number"));
}

#[test]
fn test_variable_atom_count_stats() {
    let content = "1\n\nAr 0 0 0\n3\n\nAr 0 0 0\nAr 1 0 0\nAr 2 0 0\n";
    let stats = trajectory_stats(&parse_trajectory(content, "grow.xyz").unwrap());

    assert_eq!(stats.frame_count, 2);
    assert!(!stats.constant_atom_count);
    assert_eq!(stats.total_atoms, None);
    assert_eq!(stats.atom_count_range, Some((1, 3)));
}

#[test]
fn test_compressed_input_names_format() {
    let err = parse_trajectory([0x42, 0x5a, 0x68, 0x39, 0x31], "traj.xyz.bz2").unwrap_err();
    assert!(matches!(err, StructuraError::UnsupportedBinaryFormat { .. }));
}

fn xyz_trajectory(counts: &[usize]) -> String {
    let mut text = String::new();
    for (frame, &n) in counts.iter().enumerate() {
        text.push_str(&format!("{}\nstep={}\n", n, frame));
        for i in 0..n {
            text.push_str(&format!("C {} 0 0\n", i));
        }
    }
    text
}

proptest! {
    #[test]
    fn prop_stats_match_frames(counts in prop::collection::vec(1usize..6, 1..8)) {
        let trajectory = parse_trajectory(xyz_trajectory(&counts), "md.xyz").unwrap();
        let stats = trajectory_stats(&trajectory);

        prop_assert_eq!(stats.frame_count, trajectory.frames.len());
        prop_assert_eq!(stats.frame_count, counts.len());

        let constant = counts.iter().all(|&n| n == counts[0]);
        prop_assert_eq!(stats.constant_atom_count, constant);
        if constant {
            prop_assert_eq!(stats.total_atoms, Some(counts[0]));
        } else {
            let lo = *counts.iter().min().unwrap();
            let hi = *counts.iter().max().unwrap();
            prop_assert_eq!(stats.atom_count_range, Some((lo, hi)));
        }
    }
}
