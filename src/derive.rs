//! Derived per-line quantities: wavenumbers from state energies, line
//! strengths at the reference and typical temperatures, atomic Einstein A.

use std::collections::HashMap;

use crate::constants::RefConstants;
use crate::data::table::{Column, ColumnData, LineTable};
use crate::error::{LineDbError, Result};
use crate::formats::exomol::StatesTable;
use crate::partition::SpeciesPartitionTable;
use crate::species::SpeciesKey;

/// Line strength at `Tref` (cm/molecule):
///
/// `Sij0 = A g / (8 pi c nu^2) exp(-c2 E''/Tref) (1 - exp(-c2 nu/Tref)) / Q(Tref)`
pub fn reference_strength(c: &RefConstants, a: f64, g_upper: f64, nu: f64, elower: f64, qtref: f64) -> f64 {
    if !(nu > 0.0) {
        return f64::NAN;
    }
    let c2 = c.hcperk;
    let pi8c = 8.0 * std::f64::consts::PI * c.ccgs;
    -a * g_upper * (-c2 * elower / c.tref).exp() * (-c2 * nu / c.tref).exp_m1()
        / (pi8c * nu * nu * qtref)
}

/// Rescale `Sij0` to temperature `t`; `qr = Q(t) / Q(Tref)`.
pub fn scale_strength(c: &RefConstants, sij0: f64, nu: f64, elower: f64, t: f64, qr: f64) -> f64 {
    let c2 = c.hcperk;
    let boltzmann = (-c2 * elower * (1.0 / t - 1.0 / c.tref)).exp();
    let stimulated = (-c2 * nu / t).exp_m1() / (-c2 * nu / c.tref).exp_m1();
    sij0 / qr * boltzmann * stimulated
}

/// Typical-temperature strength of every line; `qr(i)` is `Q(t)/Q(Tref)`
/// for line `i`.
pub fn typical_strengths(
    c: &RefConstants,
    table: &LineTable,
    t: f64,
    qr: impl Fn(usize) -> f64,
) -> Result<Vec<f64>> {
    let sij0 = table.require_float(Column::Sij0)?;
    let nu = table.require_float(Column::NuLines)?;
    let elower = table.require_float(Column::Elower)?;
    Ok((0..table.len())
        .map(|i| scale_strength(c, sij0[i], nu[i], elower[i], t, qr(i)))
        .collect())
}

// ---------------------------------------------------------------------------
// Molecular (ExoMol)
// ---------------------------------------------------------------------------

/// Attach state quantities to raw ExoMol transitions.
///
/// The wavenumber is always `E_upper - E_lower` from the states table, never
/// the catalog column. Transitions naming an unlisted state get NaN
/// energies, J = -1 and `nu_positive = false`.
pub fn join_states(trans: &mut LineTable, states: &StatesTable) -> Result<()> {
    let upper = trans.require_int(Column::IUpper)?;
    let lower = trans.require_int(Column::ILower)?;
    let n = trans.len();

    let mut nu = Vec::with_capacity(n);
    let mut elower = Vec::with_capacity(n);
    let mut gupper = Vec::with_capacity(n);
    let mut jlower = Vec::with_capacity(n);
    let mut jupper = Vec::with_capacity(n);
    let mut positive = Vec::with_capacity(n);

    for (&iu, &il) in upper.iter().zip(lower) {
        match (states.lookup(iu), states.lookup(il)) {
            (Some(u), Some(l)) => {
                let v = states.energy[u] - states.energy[l];
                nu.push(v);
                elower.push(states.energy[l]);
                gupper.push(states.gtot[u]);
                jlower.push(states.j[l].floor() as i64);
                jupper.push(states.j[u].floor() as i64);
                positive.push(v.is_finite() && v > 0.0);
            }
            _ => {
                nu.push(f64::NAN);
                elower.push(f64::NAN);
                gupper.push(f64::NAN);
                jlower.push(-1);
                jupper.push(-1);
                positive.push(false);
            }
        }
    }

    trans.insert(Column::NuLines, ColumnData::Float(nu))?;
    trans.insert(Column::Elower, ColumnData::Float(elower))?;
    trans.insert(Column::Gupper, ColumnData::Float(gupper))?;
    trans.insert(Column::Jlower, ColumnData::Int(jlower))?;
    trans.insert(Column::Jupper, ColumnData::Int(jupper))?;
    trans.insert(Column::NuPositive, ColumnData::Bool(positive))?;
    Ok(())
}

/// Add `Sij0` from `A`, `gupper`, `nu_lines`, `elower` with one `Q(Tref)`.
pub fn add_molecular_strength(table: &mut LineTable, c: &RefConstants, qtref: f64) -> Result<()> {
    let sij0 = {
        let a = table.require_float(Column::A)?;
        let g = table.require_float(Column::Gupper)?;
        let nu = table.require_float(Column::NuLines)?;
        let el = table.require_float(Column::Elower)?;
        (0..table.len())
            .map(|i| reference_strength(c, a[i], g[i], nu[i], el[i], qtref))
            .collect()
    };
    table.insert(Column::Sij0, ColumnData::Float(sij0))
}

// ---------------------------------------------------------------------------
// Atomic (VALD3, Kurucz)
// ---------------------------------------------------------------------------

/// Turn raw atomic columns into line quantities.
///
/// Adds `nu_lines` (from the vacuum wavelength), `A` and `nu_positive`, then
/// the partition-table dependent columns through [`assign_species`].
pub fn derive_atomic(
    table: &mut LineTable,
    c: &RefConstants,
    pf: &SpeciesPartitionTable,
    qtref_all: &[f64],
) -> Result<()> {
    let (nu, a) = {
        let wavelength = table.require_float(Column::Wavelength)?;
        let loggf = table.require_float(Column::LogGf)?;
        let gupper = table.require_float(Column::Gupper)?;
        let factor = c.gf_to_a_factor();
        let nu: Vec<f64> = wavelength.iter().map(|&wl| 1.0e8 / wl).collect();
        let a: Vec<f64> = (0..table.len())
            .map(|i| factor * nu[i] * nu[i] * 10f64.powf(loggf[i]) / gupper[i])
            .collect();
        (nu, a)
    };
    let positive = nu.iter().map(|&v| v.is_finite() && v > 0.0).collect();

    table.insert(Column::NuLines, ColumnData::Float(nu))?;
    table.insert(Column::A, ColumnData::Float(a))?;
    table.insert(Column::NuPositive, ColumnData::Bool(positive))?;
    assign_species(table, c, pf, qtref_all)
}

/// (Re)write `QTmask` (row of each line's species in `pf`) and `Sij0` (with
/// that row's `Q(Tref)` from `qtref_all`).
///
/// Both depend on the partition table, not on the source file, so they are
/// recomputed for every load, cached tables included. Fails with
/// `UnknownSpecies` if any line's species has no row in `pf`.
pub fn assign_species(
    table: &mut LineTable,
    c: &RefConstants,
    pf: &SpeciesPartitionTable,
    qtref_all: &[f64],
) -> Result<()> {
    let qtmask = {
        let ielem = table.require_int(Column::Ielem)?;
        let iion = table.require_int(Column::Iion)?;
        let mut rows: HashMap<(i64, i64), usize> = HashMap::new();
        let mut qtmask = Vec::with_capacity(table.len());
        for (&z, &ion) in ielem.iter().zip(iion) {
            let row = match rows.get(&(z, ion)) {
                Some(&row) => row,
                None => {
                    let key = SpeciesKey::from_columns(z, ion)
                        .ok_or_else(|| LineDbError::UnknownSpecies(format!("Z={z} ion={ion}")))?;
                    let row = pf.species_index(key)?;
                    rows.insert((z, ion), row);
                    row
                }
            };
            qtmask.push(row);
        }
        qtmask
    };

    let sij0 = {
        let a = table.require_float(Column::A)?;
        let nu = table.require_float(Column::NuLines)?;
        let gupper = table.require_float(Column::Gupper)?;
        let elower = table.require_float(Column::Elower)?;
        qtmask
            .iter()
            .enumerate()
            .map(|(i, &row)| {
                qtref_all
                    .get(row)
                    .map(|&qtref| reference_strength(c, a[i], gupper[i], nu[i], elower[i], qtref))
                    .ok_or_else(|| {
                        LineDbError::SchemaMismatch(format!(
                            "partition row {row} has no Q(Tref) among {} values",
                            qtref_all.len()
                        ))
                    })
            })
            .collect::<Result<Vec<f64>>>()?
    };

    let qtmask = qtmask.into_iter().map(|row| row as i64).collect();
    table.insert(Column::QtMask, ColumnData::Int(qtmask))?;
    table.insert(Column::Sij0, ColumnData::Float(sij0))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::path::Path;

    fn rel(a: f64, b: f64) -> f64 {
        ((a - b) / b).abs()
    }

    #[test]
    fn test_reference_strength_ground_state() {
        let c = RefConstants::default();
        // E'' = 0, Q = 1: Sij0 = A g (1 - exp(-c2 nu/Tref)) / (8 pi c nu^2).
        let (a, g, nu) = (1.0, 3.0, 1000.0);
        let expected = a * g * (1.0 - (-c.hcperk * nu / c.tref).exp())
            / (8.0 * std::f64::consts::PI * c.ccgs * nu * nu);
        assert!(rel(reference_strength(&c, a, g, nu, 0.0, 1.0), expected) < 1e-12);
        assert!(reference_strength(&c, a, g, 0.0, 0.0, 1.0).is_nan());
        assert!(reference_strength(&c, a, g, -5.0, 0.0, 1.0).is_nan());
    }

    #[test]
    fn test_scale_to_reference_is_identity() {
        let c = RefConstants::default();
        let s = scale_strength(&c, 1e-21, 2000.0, 500.0, c.tref, 1.0);
        assert!(rel(s, 1e-21) < 1e-14);
    }

    #[test]
    fn test_scale_strength_grows_for_hot_bands() {
        let c = RefConstants::default();
        // High E'': population grows with T faster than Q.
        let s = scale_strength(&c, 1e-25, 2000.0, 5000.0, 1000.0, 2.0);
        assert!(s > 1e-25);
    }

    fn states() -> StatesTable {
        let text = "1 0.0 1 0\n2 100.0 3 1\n3 300.0 5 2\n";
        StatesTable::parse(&mut Cursor::new(text), Path::new("s")).unwrap()
    }

    #[test]
    fn test_join_states_recomputes_nu() {
        let mut t = LineTable::from_columns(vec![
            (Column::IUpper, ColumnData::Int(vec![2, 3, 1, 9])),
            (Column::ILower, ColumnData::Int(vec![1, 2, 3, 1])),
            (Column::A, ColumnData::Float(vec![1.0; 4])),
        ])
        .unwrap();
        join_states(&mut t, &states()).unwrap();
        let nu = t.float(Column::NuLines).unwrap();
        assert_eq!(&nu[..3], &[100.0, 200.0, -300.0]);
        assert!(nu[3].is_nan());
        assert_eq!(t.float(Column::Elower).unwrap()[1], 100.0);
        assert_eq!(t.float(Column::Gupper).unwrap()[1], 5.0);
        assert_eq!(t.int(Column::Jlower).unwrap(), &[0, 1, 2, -1]);
        assert_eq!(t.int(Column::Jupper).unwrap(), &[1, 2, 0, -1]);
        assert_eq!(t.bool(Column::NuPositive).unwrap(), &[true, true, false, false]);

        add_molecular_strength(&mut t, &RefConstants::default(), 10.0).unwrap();
        let s = t.float(Column::Sij0).unwrap();
        assert!(s[0] > 0.0 && s[1] > 0.0 && s[2].is_nan());
    }

    #[test]
    fn test_derive_atomic() {
        let pf = SpeciesPartitionTable::parse(
            &mut Cursor::new("T[K] 100 10000\nFe_I 25 25\nCa_II 2 2\n"),
            Path::new("pf"),
        )
        .unwrap();
        let c = RefConstants::default();
        let mut t = LineTable::from_columns(vec![
            (Column::Ielem, ColumnData::Int(vec![20, 26])),
            (Column::Iion, ColumnData::Int(vec![2, 1])),
            (Column::Wavelength, ColumnData::Float(vec![4000.0, 5000.0])),
            (Column::LogGf, ColumnData::Float(vec![0.0, -1.0])),
            (Column::Gupper, ColumnData::Float(vec![4.0, 9.0])),
            (Column::Elower, ColumnData::Float(vec![0.0, 1000.0])),
        ])
        .unwrap();
        let qtref = pf.interpolate_all(c.tref);
        derive_atomic(&mut t, &c, &pf, &qtref).unwrap();

        assert_eq!(t.int(Column::QtMask).unwrap(), &[1, 0]);
        let nu = t.float(Column::NuLines).unwrap();
        assert_eq!(nu, &[25000.0, 20000.0]);
        let a = t.float(Column::A).unwrap();
        assert!(rel(a[0], c.gf_to_a_factor() * 25000.0f64.powi(2) / 4.0) < 1e-12);
        let s = t.float(Column::Sij0).unwrap();
        assert!(rel(s[0], reference_strength(&c, a[0], 4.0, 25000.0, 0.0, 2.0)) < 1e-12);
        assert!(rel(s[1], reference_strength(&c, a[1], 9.0, 20000.0, 1000.0, 25.0)) < 1e-12);
    }

    #[test]
    fn test_assign_species_follows_table_order() {
        let c = RefConstants::default();
        let first = SpeciesPartitionTable::parse(
            &mut Cursor::new("T[K] 100 10000\nFe_I 25 25\nCa_II 2 2\n"),
            Path::new("pf"),
        )
        .unwrap();
        let mut t = LineTable::from_columns(vec![
            (Column::Ielem, ColumnData::Int(vec![20, 26])),
            (Column::Iion, ColumnData::Int(vec![2, 1])),
            (Column::Wavelength, ColumnData::Float(vec![4000.0, 5000.0])),
            (Column::LogGf, ColumnData::Float(vec![0.0, -1.0])),
            (Column::Gupper, ColumnData::Float(vec![4.0, 9.0])),
            (Column::Elower, ColumnData::Float(vec![0.0, 1000.0])),
        ])
        .unwrap();
        derive_atomic(&mut t, &c, &first, &first.interpolate_all(c.tref)).unwrap();
        let s_first = t.float(Column::Sij0).unwrap().to_vec();

        let swapped = SpeciesPartitionTable::parse(
            &mut Cursor::new("T[K] 100 10000\nCa_II 4 4\nNa_I 3 3\nFe_I 25 25\n"),
            Path::new("pf"),
        )
        .unwrap();
        assign_species(&mut t, &c, &swapped, &swapped.interpolate_all(c.tref)).unwrap();
        assert_eq!(t.int(Column::QtMask).unwrap(), &[0, 2]);
        let s = t.float(Column::Sij0).unwrap();
        // Ca II: Q(Tref) doubled, strength halved. Fe I unchanged.
        assert!(rel(s[0], s_first[0] / 2.0) < 1e-12);
        assert!(rel(s[1], s_first[1]) < 1e-12);
    }

    #[test]
    fn test_derive_atomic_unknown_species() {
        let pf = SpeciesPartitionTable::parse(
            &mut Cursor::new("T[K] 100 10000\nFe_I 25 25\n"),
            Path::new("pf"),
        )
        .unwrap();
        let mut t = LineTable::from_columns(vec![
            (Column::Ielem, ColumnData::Int(vec![11])),
            (Column::Iion, ColumnData::Int(vec![1])),
            (Column::Wavelength, ColumnData::Float(vec![5890.0])),
            (Column::LogGf, ColumnData::Float(vec![0.1])),
            (Column::Gupper, ColumnData::Float(vec![4.0])),
            (Column::Elower, ColumnData::Float(vec![0.0])),
        ])
        .unwrap();
        let err = derive_atomic(&mut t, &RefConstants::default(), &pf, &[25.0]).unwrap_err();
        assert!(matches!(err, LineDbError::UnknownSpecies(s) if s == "Na 1"));
    }
}
