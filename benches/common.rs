use rand::{distributions::Alphanumeric, prelude::*};

pub fn prebuilt_kv_pairs<R>(
    rng: &mut R,
    size: usize,
    key_size: usize,
    val_size: usize,
) -> Vec<(Vec<u8>, Vec<u8>)>
where
    R: Rng,
{
    (0..size)
        .map(|_| rand_key_value(rng, key_size, val_size))
        .collect()
}

pub fn rand_key_value<R>(rng: &mut R, key_size: usize, val_size: usize) -> (Vec<u8>, Vec<u8>)
where
    R: Rng,
{
    let key: Vec<u8> = (0..key_size).map(|_| rng.sample(Alphanumeric)).collect();
    let val: Vec<u8> = (0..val_size).map(|_| rng.sample(Alphanumeric)).collect();
    (key, val)
}
