//! Lua sources for the lease operations.
//!
//! Every script receives the same two keys of one namespace:
//!
//! - `KEYS[1]`: hash of instance id to machine id
//! - `KEYS[2]`: hash of machine id to `owner|stable|last_timestamp`, where a
//!   free slot has an empty owner and keeps its last timestamp
//!
//! Leases are returned as `{machine_id, last_timestamp}`, with a machine id of
//! `-1` meaning none.

pub(crate) const PRELUDE: &str = r"
local function decode(slot)
  local owner, stable, last = string.match(slot, '^(.*)|([01])|(%d+)$')
  return owner, stable, tonumber(last)
end

local function encode(owner, stable, last)
  return owner .. '|' .. stable .. '|' .. string.format('%d', last)
end
";

/// `ARGV`: instance, machine id count, stable flag, safe-guard-at, now.
pub(crate) const CLAIM: &str = r"
local instance = ARGV[1]
local count = tonumber(ARGV[2])
local stable = ARGV[3]
local safe_guard_at = tonumber(ARGV[4])
local now = tonumber(ARGV[5])

local owned = redis.call('HGET', KEYS[1], instance)
if owned then
  local slot = redis.call('HGET', KEYS[2], owned)
  if slot then
    local owner, slot_stable, last = decode(slot)
    if owner == instance then
      if tonumber(owned) < count then
        return {tonumber(owned), last}
      end
      redis.call('HSET', KEYS[2], owned, encode('', slot_stable, last))
    end
  end
  redis.call('HDEL', KEYS[1], instance)
end

for machine_id = 0, count - 1 do
  local field = string.format('%d', machine_id)
  local slot = redis.call('HGET', KEYS[2], field)
  local previous = 0
  local claimable = true
  if slot then
    local owner, slot_stable, last = decode(slot)
    previous = last
    if owner ~= '' then
      claimable = slot_stable == '0' and last < safe_guard_at
      if claimable then
        redis.call('HDEL', KEYS[1], owner)
      end
    end
  end
  if claimable then
    redis.call('HSET', KEYS[1], instance, field)
    redis.call('HSET', KEYS[2], field, encode(instance, stable, math.max(previous, now)))
    return {machine_id, previous}
  end
end
return {-1, 0}
";

/// `ARGV`: instance, last timestamp.
pub(crate) const RELEASE: &str = r"
local owned = redis.call('HGET', KEYS[1], ARGV[1])
if not owned then
  return 0
end
redis.call('HDEL', KEYS[1], ARGV[1])
local slot = redis.call('HGET', KEYS[2], owned)
if slot then
  local owner, slot_stable, last = decode(slot)
  if owner == ARGV[1] then
    redis.call('HSET', KEYS[2], owned, encode('', slot_stable, math.max(last, tonumber(ARGV[2]))))
  end
end
return 1
";

/// `ARGV`: instance, machine id, last timestamp.
pub(crate) const GUARD: &str = r"
local slot = redis.call('HGET', KEYS[2], ARGV[2])
if not slot then
  return 0
end
local owner, slot_stable, last = decode(slot)
if owner ~= ARGV[1] then
  return 0
end
redis.call('HSET', KEYS[2], ARGV[2], encode(owner, slot_stable, math.max(last, tonumber(ARGV[3]))))
return 1
";

/// `ARGV`: instance.
pub(crate) const LEASE_OF: &str = r"
local owned = redis.call('HGET', KEYS[1], ARGV[1])
if not owned then
  return {-1, 0}
end
local slot = redis.call('HGET', KEYS[2], owned)
if not slot then
  return {-1, 0}
end
local owner, _, last = decode(slot)
if owner ~= ARGV[1] then
  return {-1, 0}
end
return {tonumber(owned), last}
";
