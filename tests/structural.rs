//! Integration tests for the structural combinators

use approx::assert_relative_eq;
use ndarray::Array2;
use num_complex::Complex64;
use qsynth::errors::OperationError;
use qsynth::{
    CapabilityKind, CapabilityRegistry, ControlledOperation, IntoOp, KetSpace, KrausOperation,
    MatrixOperation, Op, RemappedOperation, SequentialOperation, SpaceTree, Tree, gates,
};

const EPSILON: f64 = 1e-10;

fn matrix(op: &Op, spaces: &SpaceTree, order: &[KetSpace]) -> Array2<Complex64> {
    CapabilityRegistry::standard()
        .to_tensor(op)
        .unwrap()
        .to_tensor(spaces)
        .unwrap()
        .to_matrix(order)
        .unwrap()
}

fn assert_matrix_eq(a: &Array2<Complex64>, b: &Array2<Complex64>) {
    assert_eq!(a.dim(), b.dim());
    for (x, y) in a.iter().zip(b.iter()) {
        assert_relative_eq!(x.re, y.re, epsilon = EPSILON);
        assert_relative_eq!(x.im, y.im, epsilon = EPSILON);
    }
}

#[test]
fn test_not_not_is_identity() {
    let q = KetSpace::qubit();
    let op = SequentialOperation::new([gates::not().into_op(), gates::not().into_op()])
        .unwrap()
        .into_op();
    assert_matrix_eq(&matrix(&op, &Tree::leaf(q), &[q]), &Array2::eye(2));
}

#[test]
fn test_hzh_is_x() {
    let q = KetSpace::qubit();
    let op = SequentialOperation::new([
        gates::h().into_op(),
        gates::z().into_op(),
        gates::h().into_op(),
    ])
    .unwrap()
    .into_op();
    assert_matrix_eq(&matrix(&op, &Tree::leaf(q), &[q]), gates::x().matrix());
}

#[test]
fn test_sequential_of_kraus_channel_has_no_tensor_form() {
    let q = KetSpace::qubit();
    let op = SequentialOperation::new([KrausOperation::depolarizing(0.1).unwrap().into_op()])
        .unwrap()
        .into_op();
    let result = CapabilityRegistry::standard()
        .to_tensor(&op)
        .unwrap()
        .to_tensor(&Tree::leaf(q));
    assert!(matches!(result, Err(OperationError::UnsupportedCapability { .. })));
}

#[test]
fn test_controlled_not_matches_cnot_matrix() {
    let (c, t) = (KetSpace::qubit(), KetSpace::qubit());
    let op = ControlledOperation::new(gates::not().into_op(), 1).unwrap().into_op();
    let spaces = Tree::node([Tree::leaf(c), Tree::leaf(t)]);

    let mut cnot = Array2::<Complex64>::zeros((4, 4));
    for (row, col) in [(0, 0), (1, 1), (2, 3), (3, 2)] {
        cnot[[row, col]] = Complex64::new(1.0, 0.0);
    }
    assert_matrix_eq(&matrix(&op, &spaces, &[c, t]), &cnot);

    // reading the same operator with the target first swaps the roles in the matrix
    let mut flipped = Array2::<Complex64>::zeros((4, 4));
    for (row, col) in [(0, 0), (1, 3), (2, 2), (3, 1)] {
        flipped[[row, col]] = Complex64::new(1.0, 0.0);
    }
    assert_matrix_eq(&matrix(&op, &spaces, &[t, c]), &flipped);
}

#[test]
fn test_controlled_sequence_of_controlled() {
    // a controlled CX is a Toffoli
    let (a, b, t) = (KetSpace::qubit(), KetSpace::qubit(), KetSpace::qubit());
    let nested = ControlledOperation::new(gates::cx().into_op(), 1).unwrap().into_op();
    let nested_spaces = Tree::node([Tree::leaf(a), Tree::node([Tree::leaf(b), Tree::leaf(t)])]);
    let toffoli_spaces = Tree::node([Tree::flat([a, b]), Tree::leaf(t)]);
    assert_matrix_eq(
        &matrix(&nested, &nested_spaces, &[a, b, t]),
        &matrix(&gates::toffoli().into_op(), &toffoli_spaces, &[a, b, t]),
    );
}

#[test]
fn test_controlled_on_qutrit_control() {
    let (c, t) = (KetSpace::new(3), KetSpace::qubit());
    let op = ControlledOperation::new(gates::x().into_op(), 2).unwrap().into_op();
    let m = matrix(&op, &Tree::node([Tree::leaf(c), Tree::leaf(t)]), &[c, t]);
    assert_eq!(m.dim(), (6, 6));
    assert_eq!(m[[4, 5]], Complex64::new(1.0, 0.0));
    assert_eq!(m[[2, 2]], Complex64::new(1.0, 0.0));
}

#[test]
fn test_remapped_equals_original_on_mapped_spaces() {
    let (a, b) = (KetSpace::qubit(), KetSpace::qubit());
    let cx = gates::cx().into_op();
    let swap_roles = |spaces: &SpaceTree| -> Result<SpaceTree, OperationError> {
        match spaces.children() {
            Some([first, second]) => Ok(Tree::node([second.clone(), first.clone()])),
            _ => Err(OperationError::InvalidOperand("expected two groups".to_string())),
        }
    };
    let remapped = RemappedOperation::new(cx.clone(), swap_roles).into_op();
    let given = Tree::node([Tree::leaf(a), Tree::leaf(b)]);
    let mapped = Tree::node([Tree::leaf(b), Tree::leaf(a)]);
    assert_matrix_eq(&matrix(&remapped, &given, &[a, b]), &matrix(&cx, &mapped, &[a, b]));
}

#[test]
fn test_remapped_matrix_operation_on_selected_spaces() {
    let spaces: Vec<KetSpace> = (0..3).map(|_| KetSpace::qubit()).collect();
    let swap = MatrixOperation::new(gates::swap().matrix().clone()).unwrap().into_op();
    let on_outer = RemappedOperation::select(swap.clone(), vec![0, 2]).into_op();
    let tree = Tree::flat(spaces.clone());

    let direct = matrix(&swap, &Tree::flat([spaces[0], spaces[2]]), &[spaces[0], spaces[2]]);
    let via_select = CapabilityRegistry::standard()
        .to_tensor(&on_outer)
        .unwrap()
        .to_tensor(&tree)
        .unwrap()
        .to_matrix(&[spaces[0], spaces[2]])
        .unwrap();
    assert_matrix_eq(&via_select, &direct);
}

#[test]
fn test_remapped_kraus_channel_stays_a_channel() {
    let registry = CapabilityRegistry::standard();
    let channel = KrausOperation::bit_flip(0.2).unwrap().into_op();
    let op = RemappedOperation::select(channel, vec![0]).into_op();
    assert!(registry.supports(&op, CapabilityKind::ToKraus));
    assert!(!registry.supports(&op, CapabilityKind::ApplyOnPureState));
}

#[test]
fn test_mixed_apply_of_controlled_gate() {
    use qsynth::{MixedStateTensor, PureStateTensor};
    use rand::SeedableRng;

    let registry = CapabilityRegistry::standard();
    let (c, t) = (KetSpace::qubit(), KetSpace::qubit());
    let spaces = Tree::node([Tree::leaf(c), Tree::leaf(t)]);
    let mut one_zero = ndarray::Array1::<Complex64>::zeros(4);
    one_zero[2] = Complex64::new(1.0, 0.0);
    let psi = PureStateTensor::from_vector(&one_zero, &[c, t]).unwrap();
    let rho = MixedStateTensor::from_pure(&psi).unwrap();
    let mut rng = rand::rngs::StdRng::seed_from_u64(0);

    let (out, _) = registry
        .apply_on_mixed_state(&gates::cx().into_op())
        .unwrap()
        .apply_on_mixed_state_tensor(&spaces, &rho, &mut rng)
        .unwrap();
    let m = out.to_matrix(&[c, t]).unwrap();
    assert_relative_eq!(m[[3, 3]].re, 1.0, epsilon = EPSILON);
    assert_relative_eq!(out.norm().unwrap(), 1.0, epsilon = EPSILON);
}
