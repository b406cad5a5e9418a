//! A sparse tableau with efficient access to both rows and columns.
//!
//! Cells are integer numerators paired with one denominator per row; the
//! logical value at `(i, j)` is `num_ij / den_i`. Insertion is linear in the
//! number of rows and columns and only happens during initialization.
//! Algorithms are generally faster the sparser the tableau.
//!
//! Column indices are maintained lazily: a column may contain stale row
//! entries, which are compacted out the next time the column is traversed.

use std::{fmt, mem};

use itertools::{merge, Itertools};
use num_integer::Integer as _;
use num_traits::{One, Signed, Zero};

use crate::math::{gcd_div, Integer, Rational};

#[derive(Clone, Debug, PartialEq, Eq)]
/// A non-zero cell in a row of the [`Tableau`].
struct Cell {
	/// The column of the cell.
	col: usize,
	/// The numerator of the cell value.
	num: Integer,
}

#[derive(Clone, Debug)]
/// A sparse row of the [`Tableau`].
struct Row {
	/// The common denominator of all cells in the row, kept positive.
	den: Integer,
	/// The non-zero cells of the row, sorted by column.
	cells: Vec<Cell>,
}

#[derive(Clone, Debug, Default)]
/// A sparse matrix of exact rationals, indexable by row and by column.
pub struct Tableau {
	/// The rows of the tableau.
	rows: Vec<Row>,
	/// For each column, the rows with a (possibly stale) non-zero cell in it.
	cols: Vec<Vec<usize>>,
}

impl Default for Row {
	fn default() -> Self {
		Self {
			den: Integer::one(),
			cells: Vec::new(),
		}
	}
}

impl fmt::Display for Tableau {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (i, row) in self.rows.iter().enumerate() {
			writeln!(
				f,
				"y_{i} = {}",
				row.cells.iter().format_with(" + ", |cell, f| {
					f(&format_args!(
						"{}*x_{}",
						Rational::new(cell.num.clone(), row.den.clone()),
						cell.col
					))
				})
			)?;
		}
		Ok(())
	}
}

impl Tableau {
	/// Return the value at row `i` and column `j`, zero when the cell is
	/// absent. Runs in `O(log n)`.
	pub fn get(&self, i: usize, j: usize) -> Rational {
		self.rows
			.get(i)
			.and_then(|row| {
				row.cells
					.binary_search_by(|c| c.col.cmp(&j))
					.ok()
					.map(|pos| Rational::new(row.cells[pos].num.clone(), row.den.clone()))
			})
			.unwrap_or_else(Rational::zero)
	}

	/// Check that every cell of every row is indexed by its column, and that
	/// the column indices are sorted sets of existing rows.
	pub(crate) fn check_index(&self) -> bool {
		self.rows.iter().enumerate().all(|(i, row)| {
			row.cells
				.iter()
				.all(|cell| self.cols[cell.col].binary_search(&i).is_ok())
		}) && self.cols.iter().all(|col| {
			col.iter().tuple_windows().all(|(a, b)| a < b) && col.iter().all(|&i| i < self.rows.len())
		})
	}

	/// Set all cells to zero. Runs in `O(1)`.
	pub fn clear(&mut self) {
		self.rows.clear();
		self.cols.clear();
	}

	/// Whether the tableau has no non-zero cells.
	pub fn is_empty(&self) -> bool {
		self.rows.iter().all(|row| row.cells.is_empty())
	}

	/// Pivot row `i` and column `j`, whose cell must be non-zero.
	///
	/// This eliminates column `j` from all rows other than `i` and swaps the
	/// roles of the variables at row `i` and column `j`: afterwards row `i`
	/// expresses the old column variable in terms of the old row variable
	/// (now at column `j`) and the remaining columns. Runs in `O(m·n)` in
	/// the worst case.
	pub fn pivot(&mut self, i: usize, j: usize) {
		// Negate row i outside the pivot column so that the merge below
		// combines rows additively.
		self.update_row(i, |col, num, _| {
			if col != j {
				*num = -mem::take(num);
			}
		});

		// Snapshot of row i; its cells are only read multiplicatively while
		// the other rows are rewritten.
		let row_i = self.rows[i].clone();
		let d_i = row_i.den.clone();
		let pivot_pos = row_i
			.cells
			.binary_search_by(|c| c.col.cmp(&j))
			.expect("pivot cell must be non-zero");
		let a_ij = row_i.cells[pivot_pos].num.clone();

		// How many rows were appended to the column of each cell of row i.
		let mut appended = vec![0_usize; row_i.cells.len()];

		// Eliminate column j from every other row with a non-zero cell in
		// it, compacting stale column entries on the way.
		let col_j = mem::take(&mut self.cols[j]);
		let mut kept = Vec::with_capacity(col_j.len());
		let mut scratch: Vec<Cell> = Vec::new();
		for k in col_j {
			let pos = match self.rows[k].cells.binary_search_by(|c| c.col.cmp(&j)) {
				Ok(pos) => pos,
				Err(_) => continue,
			};
			kept.push(k);
			if k == i {
				continue;
			}
			let a_kj = self.rows[k].cells[pos].num.clone();
			let (ga_ij, ga_kj, _) = gcd_div(&a_ij, &a_kj);
			let old_cells = mem::take(&mut self.rows[k].cells);
			self.rows[k].den *= &ga_ij;

			// Merge-walk the two sorted sparse rows.
			let mut lhs = row_i.cells.iter().enumerate().peekable();
			let mut rhs = old_cells.into_iter().peekable();
			while lhs.peek().is_some() || rhs.peek().is_some() {
				let l_col = lhs.peek().map(|(_, c)| c.col);
				let r_col = rhs.peek().map(|c| c.col);
				if r_col.is_none() || (l_col.is_some() && l_col < r_col) {
					// a_il != 0 and a_kl == 0: a new cell appears in row k.
					let (idx, cl) = lhs.next().expect("peeked above");
					debug_assert_ne!(cl.col, j);
					scratch.push(Cell {
						col: cl.col,
						num: &ga_kj * &cl.num,
					});
					self.cols[cl.col].push(k);
					appended[idx] += 1;
				} else if l_col.is_none() || r_col < l_col {
					// a_il == 0 and a_kl != 0.
					let mut cell = rhs.next().expect("peeked above");
					cell.num *= &ga_ij;
					scratch.push(cell);
				} else {
					let (_, cl) = lhs.next().expect("peeked above");
					let mut cell = rhs.next().expect("peeked above");
					if cell.col != j {
						let num = mem::take(&mut cell.num);
						cell.num = num * &ga_ij + &ga_kj * &cl.num;
						if !cell.num.is_zero() {
							scratch.push(cell);
						}
					} else {
						// The pivot column itself.
						cell.num = &ga_kj * &d_i;
						scratch.push(cell);
					}
				}
			}
			mem::swap(&mut self.rows[k].cells, &mut scratch);
			scratch.clear();
			self.simplify(k);
		}
		self.cols[j] = kept;

		// The pivot cell and the row denominator swap, inverting the pivot
		// entry.
		{
			let (num, den) = self.value_mut(i, j);
			mem::swap(num, den);
		}
		self.simplify(i);

		// Restore sortedness of the columns that gained entries. The lazy
		// deletion scheme means entries need not be unique.
		for (idx, cell) in row_i.cells.iter().enumerate() {
			if appended[idx] == 0 {
				continue;
			}
			let mut col = mem::take(&mut self.cols[cell.col]);
			let suffix = col.split_off(col.len() - appended[idx]);
			self.cols[cell.col] = merge(col, suffix).dedup().collect();
		}
	}

	/// Set the value at row `i` and column `j`, removing the cell when `a`
	/// is zero. The per-row denominator is rescaled so that all numerators
	/// stay integral. Runs in `O(m + n)`.
	pub fn set(&mut self, i: usize, j: usize, a: &Rational) {
		if a.is_zero() {
			if let Some(row) = self.rows.get_mut(i) {
				if let Ok(pos) = row.cells.binary_search_by(|c| c.col.cmp(&j)) {
					let _ = row.cells.remove(pos);
					if let Ok(pos) = self.cols[j].binary_search(&i) {
						let _ = self.cols[j].remove(pos);
					}
				}
			}
		} else {
			if self.rows.len() <= i {
				self.rows.resize_with(i + 1, Row::default);
			}
			let row = &mut self.rows[i];
			let (ag, rg, _) = gcd_div(a.denom(), &row.den);
			let num = a.numer() * &rg;
			let pos = match row.cells.binary_search_by(|c| c.col.cmp(&j)) {
				Ok(pos) => {
					row.cells[pos].num = num;
					pos
				}
				Err(pos) => {
					row.cells.insert(pos, Cell { col: j, num });
					pos
				}
			};
			if !ag.is_one() {
				row.den *= &ag;
				for (k, cell) in row.cells.iter_mut().enumerate() {
					if k != pos {
						cell.num *= &ag;
					}
				}
			}
			if self.cols.len() <= j {
				self.cols.resize_with(j + 1, Vec::new);
			}
			let col = &mut self.cols[j];
			if let Err(pos) = col.binary_search(&i) {
				col.insert(pos, i);
			}
		}
	}

	/// Get the number of non-zero cells. Runs in `O(m)`.
	pub fn size(&self) -> usize {
		self.rows.iter().map(|row| row.cells.len()).sum()
	}

	/// Divide row `i` by the gcd of its numerators and denominator, and
	/// normalize the denominator to be positive.
	fn simplify(&mut self, i: usize) {
		let Row { den, cells } = &mut self.rows[i];
		if den.is_negative() {
			*den = -mem::take(den);
			for cell in cells.iter_mut() {
				cell.num = -mem::take(&mut cell.num);
			}
		}
		if den.is_one() {
			return;
		}
		let mut g = den.clone();
		for cell in cells.iter() {
			g = cell.num.gcd(&g);
			if g.is_one() {
				return;
			}
		}
		for cell in cells.iter_mut() {
			cell.num /= &g;
		}
		*den /= &g;
	}

	/// Call `f(i, num_ij, den_i)` for each cell `a_ij != 0` of column `j`,
	/// compacting stale entries out of the column index. `f` may change the
	/// numerator but must not set it to zero. Runs in `O(m·log n)`.
	pub fn update_col<F: FnMut(usize, &mut Integer, &Integer)>(&mut self, j: usize, mut f: F) {
		if j >= self.cols.len() {
			return;
		}
		let mut col = mem::take(&mut self.cols[j]);
		col.retain(|&i| {
			let Row { den, cells } = &mut self.rows[i];
			match cells.binary_search_by(|c| c.col.cmp(&j)) {
				Ok(pos) => {
					f(i, &mut cells[pos].num, den);
					true
				}
				Err(_) => false,
			}
		});
		self.cols[j] = col;
	}

	/// Call `f(j, num_ij, den_i)` for each cell `a_ij != 0` of row `i`. `f`
	/// may change the numerator but must not set it to zero. Runs in `O(n)`.
	pub fn update_row<F: FnMut(usize, &mut Integer, &Integer)>(&mut self, i: usize, mut f: F) {
		if let Some(Row { den, cells }) = self.rows.get_mut(i) {
			for cell in cells {
				f(cell.col, &mut cell.num, den);
			}
		}
	}

	/// Return mutable references to the numerator and denominator at row
	/// `i` and column `j`, presuming the cell is non-zero. The numerator
	/// must not be set to zero through the returned reference.
	pub(crate) fn value_mut(&mut self, i: usize, j: usize) -> (&mut Integer, &mut Integer) {
		let Row { den, cells } = &mut self.rows[i];
		let pos = cells
			.binary_search_by(|c| c.col.cmp(&j))
			.expect("cell must be non-zero");
		(&mut cells[pos].num, den)
	}
}
