//! Readers for the census income CSV and `user::item::rating::timestamp` rating dumps.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use log::{debug, info};
use rand::Rng;

use super::{DataErr, Example, Rating, Result};

const CENSUS_FIELDS: usize = 15;
const MISSING: &str = "?";
const UNKNOWN: &str = "Unknown";
const HIGH_INCOME: &str = ">50K";

/// One row of the census income dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct CensusRecord {
    pub age: i64,
    pub workclass: String,
    pub fnlwgt: i64,
    pub education: String,
    pub education_num: i64,
    pub marital_status: String,
    pub occupation: String,
    pub relationship: String,
    pub race: String,
    pub sex: String,
    pub capital_gain: i64,
    pub capital_loss: i64,
    pub hours_per_week: i64,
    pub native_country: String,
    pub income: String,
}

impl CensusRecord {
    /// The dimension of `features`.
    pub const FEATURES: usize = 6;

    /// Parses a `", "` separated line.
    ///
    /// # Returns
    /// `None` if the line doesn't have 15 fields or a numeric field doesn't parse.
    pub fn parse(line: &str) -> Option<Self> {
        let fields: Vec<&str> = line.trim().split(", ").collect();
        if fields.len() != CENSUS_FIELDS {
            return None;
        }

        let number = |i: usize| fields[i].trim().parse::<i64>().ok();
        let category = |i: usize| match fields[i].trim() {
            MISSING => UNKNOWN.to_string(),
            value => value.to_string(),
        };

        Some(Self {
            age: number(0)?,
            workclass: category(1),
            fnlwgt: number(2)?,
            education: category(3),
            education_num: number(4)?,
            marital_status: category(5),
            occupation: category(6),
            relationship: category(7),
            race: category(8),
            sex: category(9),
            capital_gain: number(10)?,
            capital_loss: number(11)?,
            hours_per_week: number(12)?,
            native_country: category(13),
            income: fields[14].trim().trim_end_matches('.').to_string(),
        })
    }

    /// The numeric columns, in file order.
    pub fn features(&self) -> Vec<f32> {
        [
            self.age,
            self.fnlwgt,
            self.education_num,
            self.capital_gain,
            self.capital_loss,
            self.hours_per_week,
        ]
        .into_iter()
        .map(|x| x as f32)
        .collect()
    }

    pub fn high_income(&self) -> bool {
        self.income == HIGH_INCOME
    }

    pub fn to_example(&self) -> Example<bool> {
        Example::new(self.features(), self.high_income())
    }

    /// A copy with its numeric columns slightly shifted.
    fn jitter<R: Rng + ?Sized>(&self, rng: &mut R) -> Self {
        let mut record = self.clone();
        record.age += rng.random_range(-5..5);
        record.fnlwgt += rng.random_range(-2500..2500);
        record.capital_gain += rng.random_range(-500..500);
        record.capital_loss += rng.random_range(-250..250);
        record.hours_per_week += rng.random_range(-5..5);
        record
    }
}

/// Reads census records, skipping malformed lines.
///
/// # Arguments
/// * `reader` - The CSV contents.
///
/// # Returns
/// The parsed records or an io error.
pub fn read_census<R: BufRead>(reader: R) -> Result<Vec<CensusRecord>> {
    let mut records = Vec::new();
    let mut skipped = 0;

    for line in reader.lines() {
        match CensusRecord::parse(&line?) {
            Some(record) => records.push(record),
            None => skipped += 1,
        }
    }

    debug!("census parsed: records={} skipped={skipped}", records.len());
    Ok(records)
}

/// Loads the census file at `path`.
pub fn load_census<P: AsRef<Path>>(path: P) -> Result<Vec<CensusRecord>> {
    let records = read_census(BufReader::new(File::open(path.as_ref())?))?;
    info!(
        "census loaded: path={} records={}",
        path.as_ref().display(),
        records.len()
    );

    Ok(records)
}

/// Grows `records` up to `target` with jittered copies of random existing records.
///
/// # Arguments
/// * `records` - The records to grow, left as is if already large enough.
/// * `target` - The wanted amount of records.
/// * `rng` - A random number generator.
///
/// # Returns
/// A `NoRecords` error if there is nothing to copy from.
pub fn augment<R: Rng + ?Sized>(
    records: &mut Vec<CensusRecord>,
    target: usize,
    rng: &mut R,
) -> Result<()> {
    if records.len() >= target {
        return Ok(());
    }

    if records.is_empty() {
        return Err(DataErr::NoRecords);
    }

    let original = records.len();
    records.reserve(target - original);

    while records.len() < target {
        let record = records[rng.random_range(0..original)].jitter(rng);
        records.push(record);
    }

    Ok(())
}

/// Reads `user::item::rating::timestamp` lines, skipping malformed ones.
///
/// # Arguments
/// * `reader` - The dump contents.
///
/// # Returns
/// The parsed ratings or an io error.
pub fn read_ratings<R: BufRead>(reader: R) -> Result<Vec<Rating>> {
    let mut ratings = Vec::new();
    let mut skipped = 0;

    for line in reader.lines() {
        match parse_rating(&line?) {
            Some(rating) => ratings.push(rating),
            None => skipped += 1,
        }
    }

    debug!("ratings parsed: ratings={} skipped={skipped}", ratings.len());
    Ok(ratings)
}

/// Loads the rating dump at `path`.
pub fn load_ratings<P: AsRef<Path>>(path: P) -> Result<Vec<Rating>> {
    let ratings = read_ratings(BufReader::new(File::open(path.as_ref())?))?;
    info!(
        "ratings loaded: path={} ratings={}",
        path.as_ref().display(),
        ratings.len()
    );

    Ok(ratings)
}

fn parse_rating(line: &str) -> Option<Rating> {
    let mut fields = line.trim().split("::");

    let user = fields.next()?.parse().ok()?;
    let item = fields.next()?.parse().ok()?;
    let value = fields.next()?.parse().ok()?;
    let timestamp = fields.next()?.parse().ok()?;

    if fields.next().is_some() {
        return None;
    }

    Some(Rating {
        user,
        item,
        value,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    const CENSUS: &str = "\
39, State-gov, 77516, Bachelors, 13, Never-married, Adm-clerical, Not-in-family, White, Male, 2174, 0, 40, United-States, <=50K
52, ?, 209642, HS-grad, 9, Married-civ-spouse, ?, Husband, White, Male, 0, 0, 45, ?, >50K.
not, a, record

31, Private, abc, Masters, 14, Never-married, Prof-specialty, Not-in-family, White, Female, 14084, 0, 50, United-States, >50K
";

    #[test]
    fn census_lines() {
        let records = read_census(Cursor::new(CENSUS)).unwrap();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.features(), [39., 77516., 13., 2174., 0., 40.]);
        assert!(!first.high_income());

        let second = &records[1];
        assert_eq!(second.workclass, UNKNOWN);
        assert_eq!(second.occupation, UNKNOWN);
        assert_eq!(second.native_country, UNKNOWN);
        assert!(second.to_example().label);
    }

    #[test]
    fn augmentation_grows_to_target() {
        let mut records = read_census(Cursor::new(CENSUS)).unwrap();
        let mut rng = StdRng::seed_from_u64(3);

        augment(&mut records, 50, &mut rng).unwrap();
        assert_eq!(records.len(), 50);

        for record in &records[2..] {
            let source = records[..2]
                .iter()
                .find(|r| r.income == record.income)
                .unwrap();
            assert!((record.age - source.age).abs() <= 5);
        }

        let mut empty = Vec::new();
        assert!(matches!(
            augment(&mut empty, 1, &mut rng),
            Err(DataErr::NoRecords)
        ));
    }

    #[test]
    fn rating_lines() {
        let dump = "1::1193::5::978300760\n1::661::3::978302109\nbroken\n2::3::x::1\n";
        let ratings = read_ratings(Cursor::new(dump)).unwrap();

        assert_eq!(ratings.len(), 2);
        assert_eq!(
            ratings[0],
            Rating {
                user: 1,
                item: 1193,
                value: 5.,
                timestamp: 978300760
            }
        );
    }
}
